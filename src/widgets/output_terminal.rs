use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::{gdk, gio, glib};
use vte4::prelude::*;

use crate::i18n::gettext;

// Adwaita-like ANSI palettes: 8 normal colors followed by 8 bright ones.
const DARK: [(f32, f32, f32); 16] = [
    (0.2, 0.2, 0.2),
    (0.89, 0.35, 0.36),
    (0.37, 0.76, 0.36),
    (0.87, 0.75, 0.29),
    (0.36, 0.62, 0.89),
    (0.76, 0.51, 0.85),
    (0.36, 0.78, 0.85),
    (0.82, 0.82, 0.82),
    (0.5, 0.5, 0.5),
    (1.0, 0.55, 0.56),
    (0.56, 0.93, 0.56),
    (1.0, 0.93, 0.56),
    (0.56, 0.8, 1.0),
    (0.94, 0.71, 1.0),
    (0.56, 0.96, 1.0),
    (1.0, 1.0, 1.0),
];
const LIGHT: [(f32, f32, f32); 16] = [
    (0.2, 0.2, 0.2),
    (0.8, 0.0, 0.0),
    (0.0, 0.6, 0.0),
    (0.8, 0.62, 0.0),
    (0.13, 0.34, 0.76),
    (0.76, 0.27, 0.76),
    (0.0, 0.6, 0.76),
    (0.7, 0.7, 0.7),
    (0.5, 0.5, 0.5),
    (1.0, 0.0, 0.0),
    (0.0, 0.7, 0.0),
    (0.85, 0.75, 0.0),
    (0.0, 0.0, 1.0),
    (1.0, 0.0, 1.0),
    (0.0, 0.75, 0.85),
    (0.99, 0.99, 0.99),
];

fn rgba((r, g, b): (f32, f32, f32)) -> gdk::RGBA {
    gdk::RGBA::new(r, g, b, 1.0)
}

/// Follows the light/dark preference of the style manager.
fn apply_palette(terminal: &vte4::Terminal) {
    let dark = adw::StyleManager::default().is_dark();
    let (fg, bg, palette) = if dark {
        ((0.92, 0.92, 0.92), (0.1, 0.1, 0.1), DARK)
    } else {
        ((0.2, 0.2, 0.2), (0.98, 0.98, 0.98), LIGHT)
    };
    let palette: Vec<gdk::RGBA> = palette.into_iter().map(rgba).collect();
    let palette_refs: Vec<&gdk::RGBA> = palette.iter().collect();
    terminal.set_colors(Some(&rgba(fg)), Some(&rgba(bg)), &palette_refs);
}

/// VTE expects CRLF line endings.
pub fn to_terminal_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

mod imp {
    use super::*;

    pub struct OutputTerminal {
        pub terminal: vte4::Terminal,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for OutputTerminal {
        const NAME: &'static str = "OutputTerminal";
        type Type = super::OutputTerminal;
        type ParentType = adw::Bin;

        fn new() -> Self {
            Self {
                terminal: vte4::Terminal::new(),
            }
        }
    }

    impl ObjectImpl for OutputTerminal {}
    impl WidgetImpl for OutputTerminal {}
    impl BinImpl for OutputTerminal {}
}

glib::wrapper! {
    /// Read-only terminal for container logs and compose output.
    pub struct OutputTerminal(ObjectSubclass<imp::OutputTerminal>)
        @extends adw::Bin, gtk::Widget,
        @implements gtk::Accessible, gtk::Buildable, gtk::ConstraintTarget;
}

impl OutputTerminal {
    pub fn new() -> Self {
        let obj: Self = glib::Object::new();
        obj.build_ui();
        obj
    }

    fn build_ui(&self) {
        let terminal = &self.imp().terminal;
        terminal.set_scroll_on_output(true);
        terminal.set_scroll_on_keystroke(false);
        terminal.set_input_enabled(false);
        terminal.set_vexpand(true);
        terminal.add_css_class("output-terminal");
        apply_palette(terminal);

        let action_group = gio::SimpleActionGroup::new();
        let copy_action = gio::SimpleAction::new("copy", None);
        copy_action.connect_activate(glib::clone!(
            #[weak]
            terminal,
            move |_, _| {
                terminal.copy_clipboard_format(vte4::Format::Text);
            }
        ));
        action_group.add_action(&copy_action);
        terminal.insert_action_group("terminal", Some(&action_group));

        let menu_model = gio::Menu::new();
        menu_model.append(Some(&gettext("Copy")), Some("terminal.copy"));
        terminal.set_context_menu_model(Some(&menu_model));

        self.set_child(Some(terminal));
    }

    pub fn write_text(&self, text: &str) {
        self.imp().terminal.feed(to_terminal_text(text).as_bytes());
    }
}

impl Default for OutputTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings() {
        assert_eq!(to_terminal_text("a\nb\r\nc"), "a\r\nb\r\nc");
        assert_eq!(to_terminal_text(""), "");
    }

    #[test]
    fn palette_components_are_normalized() {
        for (r, g, b) in DARK.iter().chain(LIGHT.iter()) {
            for c in [r, g, b] {
                assert!((0.0..=1.0).contains(c), "{c} is outside 0..=1");
            }
        }
    }
}
