use crate::i18n::gettext;
use crate::widgets::OutputTerminal;
use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::glib;

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct OutputDialog {
        pub window_title: adw::WindowTitle,
        pub terminal: OutputTerminal,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for OutputDialog {
        const NAME: &'static str = "OutputDialog";
        type Type = super::OutputDialog;
        type ParentType = adw::Dialog;
    }

    impl ObjectImpl for OutputDialog {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.set_content_width(900);
            obj.set_content_height(560);

            let toolbar_view = adw::ToolbarView::new();
            let header_bar = adw::HeaderBar::new();
            header_bar.set_title_widget(Some(&self.window_title));
            toolbar_view.add_top_bar(&header_bar);

            let frame = gtk::Frame::new(None);
            frame.add_css_class("output");
            frame.set_margin_start(12);
            frame.set_margin_end(12);
            frame.set_margin_top(6);
            frame.set_margin_bottom(12);
            frame.set_child(Some(&self.terminal));
            toolbar_view.set_content(Some(&frame));

            obj.set_child(Some(&toolbar_view));
        }
    }

    impl WidgetImpl for OutputDialog {}
    impl AdwDialogImpl for OutputDialog {}
}

glib::wrapper! {
    /// Shows container logs or compose output in a read-only terminal.
    pub struct OutputDialog(ObjectSubclass<imp::OutputDialog>)
        @extends adw::Dialog, gtk::Widget,
        @implements gtk::Accessible, gtk::Buildable, gtk::ConstraintTarget;
}

impl OutputDialog {
    pub fn new(title: &str, output: &str) -> Self {
        let this: Self = glib::Object::new();
        this.set_title(title);
        this.imp().window_title.set_title(title);
        if output.trim().is_empty() {
            this.imp().window_title.set_subtitle(&gettext("No output"));
        }
        this.imp().terminal.write_text(output);
        this
    }
}
