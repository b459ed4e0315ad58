//! Caption Module
//!
//! Window titles as shown to the user. Remote windows get a ` <@host>`
//! suffix and windows with identical titles are numbered ` <2>`, ` <3>`...
//! so they can be told apart in switchers and taskbars.

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::events::ClientEvent;

/// Left-to-right mark, keeps suffixes readable after RTL titles
const LRM: char = '\u{200E}';

/// Drop control characters and collapse runs of whitespace
pub fn simplify_caption(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Workspace {
    /// Set the normal caption and recompute the suffix. `force` recomputes
    /// even when the title did not change.
    pub fn set_caption(&mut self, id: ClientId, raw: &str, force: bool) {
        let condensed = self.config.behavior.condensed_title;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let normal = simplify_caption(raw);
        let changed = normal != c.caption.normal;
        if !force && !changed {
            return;
        }
        c.caption.normal = normal;

        let was_suffix = !c.caption.suffix.is_empty();
        let machine_suffix = if !condensed && !c.machine.local && !c.machine.hostname.is_empty() {
            format!(" <@{}>{}", c.machine.hostname, LRM)
        } else {
            String::new()
        };
        c.caption.suffix = machine_suffix.clone();
        let numbered = !c.is_special_window() || c.is_toolbar();
        let window = c.window;

        if numbered {
            let mut n = 2;
            while self.find_client_with_same_caption(id) {
                if let Some(c) = self.clients.get_mut(&id) {
                    c.caption.suffix = format!("{} <{}>{}", machine_suffix, n, LRM);
                }
                n += 1;
            }
        }

        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let full = c.caption.full();
        if !c.caption.suffix.is_empty() {
            self.services.display.set_visible_name(window, Some(&full));
        } else if was_suffix || force {
            self.services.display.set_visible_name(window, None);
        }
        if let Some(deco) = c.decoration.as_mut() {
            deco.set_caption(&full);
        }
        self.events.push(ClientEvent::CaptionChanged(id));
    }

    fn find_client_with_same_caption(&self, id: ClientId) -> bool {
        let Some(c) = self.clients.get(&id) else {
            return false;
        };
        let caption = c.caption();
        self.clients.values().any(|other| {
            other.id != id
                && (!other.is_special_window() || other.is_toolbar())
                && other.caption() == caption
        })
    }

    /// WM_NAME / _NET_WM_NAME changed
    pub fn fetch_name(&mut self, id: ClientId, name: Option<&str>) {
        self.set_caption(id, name.unwrap_or_default(), false);
    }

    /// WM_ICON_NAME / _NET_WM_ICON_NAME changed
    pub fn fetch_iconic_name(&mut self, id: ClientId, name: Option<&str>) {
        let iconic = simplify_caption(name.unwrap_or_default());
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.caption.iconic != iconic {
            c.caption.iconic = iconic;
            self.events.push(ClientEvent::CaptionChanged(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client_flags::WindowType;
    use crate::wm::testing::{DisplayCall, TestSetup, WindowSpec};

    #[test]
    fn test_simplify_strips_control_characters() {
        assert_eq!(simplify_caption("a\u{7}b\tc  d\n"), "ab c d");
    }

    #[test]
    fn test_duplicate_captions_are_numbered() {
        let mut t = TestSetup::new();
        let a = t.manage(WindowSpec::normal(0x100).named("Editor"));
        let b = t.manage(WindowSpec::normal(0x200).named("Editor"));
        let c = t.manage(WindowSpec::normal(0x300).named("Editor"));
        assert_eq!(t.ws.client(a).unwrap().caption(), "Editor");
        assert_eq!(t.ws.client(b).unwrap().caption(), "Editor <2>\u{200E}");
        assert_eq!(t.ws.client(c).unwrap().caption(), "Editor <3>\u{200E}");
        assert!(t
            .display
            .calls()
            .contains(&DisplayCall::VisibleName(0x200, Some("Editor <2>\u{200E}".into()))));
    }

    #[test]
    fn test_special_windows_are_not_numbered() {
        let mut t = TestSetup::new();
        t.manage(WindowSpec::normal(0x100).named("Panel").of_type(WindowType::Dock));
        let b = t.manage(WindowSpec::normal(0x200).named("Panel").of_type(WindowType::Dock));
        assert_eq!(t.ws.client(b).unwrap().caption(), "Panel");
    }

    #[test]
    fn test_remote_machine_suffix() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).named("Shell").machine("faraway"));
        assert_eq!(t.ws.client(id).unwrap().caption(), "Shell <@faraway>\u{200E}");

        let mut t = TestSetup::with_config(|c| c.behavior.condensed_title = true);
        let id = t.manage(WindowSpec::normal(0x100).named("Shell").machine("faraway"));
        assert_eq!(t.ws.client(id).unwrap().caption(), "Shell");
    }

    #[test]
    fn test_suffix_removed_when_title_changes() {
        let mut t = TestSetup::new();
        t.manage(WindowSpec::normal(0x100).named("Editor"));
        let b = t.manage(WindowSpec::normal(0x200).named("Editor"));
        t.ws.fetch_name(b, Some("Other"));
        assert_eq!(t.ws.client(b).unwrap().caption(), "Other");
        assert!(t.display.calls().contains(&DisplayCall::VisibleName(0x200, None)));
    }
}
