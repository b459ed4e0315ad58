//! Client Events
//!
//! Notifications the window core emits for the stacking/workspace layer,
//! the compositor and taskbars. They are queued on the workspace and drained
//! by whoever drives it.

use crate::shared::Geometry;
use crate::wm::client::ClientId;
use crate::wm::client_flags::WindowLayer;
use crate::wm::deleted::DeletedId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Management finished; sent exactly once per window
    Managed(ClientId),
    GeometryChanged { client: ClientId, old: Geometry, new: Geometry },
    Shown(ClientId),
    Hidden(ClientId),
    /// Region that needs repainting
    Repaint(Geometry),
    /// The window is gone. `deleted` is the placeholder observers may ref.
    Closed { client: ClientId, deleted: Option<DeletedId> },
    TransientChanged(ClientId),
    LayerChanged { client: ClientId, layer: WindowLayer },
    CaptionChanged(ClientId),
    UnresponsiveChanged { client: ClientId, unresponsive: bool },
    ReadyForPainting(ClientId),
    DemandsAttention { client: ClientId, demands: bool },
    DesktopChanged(ClientId),
    ActivitiesChanged(ClientId),
    MinimizedChanged { client: ClientId, minimized: bool },
    ShadeChanged(ClientId),
    MaximizeChanged(ClientId),
    FullScreenChanged(ClientId),
    ActiveChanged(Option<ClientId>),
    /// Kept-for-preview windows need restacking
    HiddenPreviewChanged(ClientId),
    /// Keep a newly managed window below the active one
    RestackUnderActive(ClientId),
    ScreenEdgeReserved { client: ClientId, edge: u32 },
    ScreenEdgeReleased(ClientId),
}
