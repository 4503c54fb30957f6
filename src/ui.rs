use crate::audio::SoundPlayer;
use crate::calculator::{Calculator, DigitKey, Input, Operator};
use crate::config::Config;
use crate::tone::Tone;
use gtk::prelude::*;
use gtk::gdk;
use gtk::glib;
use gtk::{Application, Box as GtkBox, Button, CheckButton, EventControllerKey, Grid, Label, Window};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

const KEYPAD: [[&str; 4]; 5] = [
    ["C", "⌫", "÷", "×"],
    ["7", "8", "9", "-"],
    ["4", "5", "6", "+"],
    ["1", "2", "3", "="],
    ["0", "00", ".", "="],
];

/// Engine plus the widgets and sound that react to it.
struct Shell {
    calculator: Calculator,
    sound: SoundPlayer,
    display: Label,
}

impl Shell {
    fn dispatch(&mut self, input: Input) {
        let was_error = self.calculator.is_error();
        let text = self.calculator.handle(input);
        self.display.set_text(text);
        trace!(
            display = self.calculator.display(),
            stored = ?self.calculator.stored_operand(),
            pending = ?self.calculator.pending_operator(),
            new_number = self.calculator.starts_new_number(),
            "calculator state"
        );

        let tone = feedback_tone(input, was_error, self.calculator.is_error());
        if !self.sound.play(tone) {
            trace!(?tone, "no tone played");
        }
    }
}

/// Tone for a keypress; the error tone wins when the press caused an error.
fn feedback_tone(input: Input, was_error: bool, is_error: bool) -> Tone {
    if is_error && !was_error {
        Tone::Error
    } else {
        Tone::for_input(&input)
    }
}

pub fn build_ui(app: &Application, config: Config) {
    let config = Rc::new(RefCell::new(config));
    let (window_config, theme, sound_config) = {
        let config = config.borrow();
        (config.window.clone(), config.theme.clone(), config.sound.clone())
    };

    let window = Window::builder()
        .application(app)
        .title("Basic Calculator")
        .default_width(window_config.width)
        .default_height(window_config.height)
        .build();

    let root = GtkBox::builder()
        .orientation(gtk::Orientation::Vertical)
        .spacing(10)
        .margin_start(10)
        .margin_end(10)
        .margin_top(10)
        .margin_bottom(10)
        .build();
    root.add_css_class("calculator");

    let grid = Grid::builder()
        .row_spacing(8)
        .column_spacing(8)
        .row_homogeneous(true)
        .column_homogeneous(true)
        .vexpand(true)
        .build();

    let mut calculator = Calculator::new();
    let display = Label::builder().label(calculator.display()).xalign(1.0).build();
    display.add_css_class("display");

    let window_weak = window.downgrade();
    calculator.set_error_handler(move |message| {
        if let Some(window) = window_weak.upgrade() {
            show_error(&window, message);
        }
    });

    let shell = Rc::new(RefCell::new(Shell {
        calculator,
        sound: SoundPlayer::new(sound_config.enabled, sound_config.volume),
        display: display.clone(),
    }));

    for (row, labels) in KEYPAD.iter().enumerate() {
        for (col, label) in labels.iter().enumerate() {
            // The bottom-right cell is covered by the tall "=" above it.
            if row == 4 && col == 3 {
                continue;
            }
            let Some(input) = Input::from_label(label) else {
                continue;
            };
            let button = Button::with_label(label);
            button.set_focusable(false);
            button.add_css_class(css_class_for(input));

            let height = if *label == "=" { 2 } else { 1 };
            grid.attach(&button, col as i32, row as i32, 1, height);

            let shell_clone = shell.clone();
            button.connect_clicked(move |_| {
                shell_clone.borrow_mut().dispatch(input);
            });
        }
    }

    let sound_toggle = CheckButton::with_label("Sound");
    sound_toggle.set_active(sound_config.enabled);
    sound_toggle.set_focusable(false);
    let shell_clone = shell.clone();
    let config_clone = config.clone();
    sound_toggle.connect_toggled(move |toggle| {
        let enabled = toggle.is_active();
        {
            let mut shell = shell_clone.borrow_mut();
            if shell.sound.is_enabled() == enabled {
                return;
            }
            shell.sound.set_enabled(enabled);
        }

        let mut config = config_clone.borrow_mut();
        config.sound.enabled = enabled;
        if let Err(e) = config.save() {
            warn!(error = %e, "could not save sound setting");
        }
    });

    // Capture phase so keys reach the calculator before any focused widget.
    let key_controller = EventControllerKey::new();
    key_controller.set_propagation_phase(gtk::PropagationPhase::Capture);
    let shell_clone = shell.clone();
    key_controller.connect_key_pressed(move |_, keyval, _, _| match input_for_key(keyval) {
        Some(input) => {
            shell_clone.borrow_mut().dispatch(input);
            glib::Propagation::Stop
        }
        None => glib::Propagation::Proceed,
    });
    window.add_controller(key_controller);

    let css = format!(
        r#"
        .calculator {{
            background-color: {};
        }}

        .display {{
            color: {};
            font-size: {}pt;
            font-weight: bold;
            padding: 10px;
        }}

        button {{
            font-size: {}pt;
        }}

        button.operator,
        button.equals {{
            color: {};
        }}
        "#,
        theme.background_color,
        theme.text_color,
        window_config.display_font_size,
        window_config.button_font_size,
        theme.accent_color,
    );

    let provider = gtk::CssProvider::new();
    provider.load_from_data(&css);
    match gdk::Display::default() {
        Some(gdk_display) => gtk::style_context_add_provider_for_display(
            &gdk_display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        ),
        None => debug!("no default display, skipping stylesheet"),
    }

    root.append(&display);
    root.append(&grid);
    root.append(&sound_toggle);
    window.set_child(Some(&root));
    window.present();
}

fn show_error(window: &Window, message: &str) {
    let dialog = gtk::AlertDialog::builder()
        .modal(true)
        .message("Calculation Error")
        .detail(message)
        .build();
    dialog.show(Some(window));
}

fn css_class_for(input: Input) -> &'static str {
    match input {
        Input::Digit(_) | Input::Dot => "digit",
        Input::Operator(_) => "operator",
        Input::Equals => "equals",
        Input::Clear | Input::Backspace => "edit",
    }
}

/// Keyboard shortcut for `key`, if any.
fn input_for_key(key: gdk::Key) -> Option<Input> {
    match key {
        gdk::Key::Return | gdk::Key::KP_Enter | gdk::Key::KP_Equal => Some(Input::Equals),
        gdk::Key::BackSpace => Some(Input::Backspace),
        gdk::Key::Delete | gdk::Key::KP_Delete | gdk::Key::Escape => Some(Input::Clear),
        gdk::Key::KP_Add => Some(Input::Operator(Operator::Add)),
        gdk::Key::KP_Subtract => Some(Input::Operator(Operator::Sub)),
        gdk::Key::KP_Multiply => Some(Input::Operator(Operator::Mul)),
        gdk::Key::KP_Divide => Some(Input::Operator(Operator::Div)),
        gdk::Key::KP_Decimal | gdk::Key::KP_Separator => Some(Input::Dot),
        _ => key.to_unicode().and_then(input_for_char),
    }
}

fn input_for_char(c: char) -> Option<Input> {
    match c {
        '.' | ',' => Some(Input::Dot),
        '=' => Some(Input::Equals),
        _ => DigitKey::from_char(c)
            .map(Input::Digit)
            .or_else(|| Operator::from_symbol(c).map(Input::Operator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_labels_are_all_inputs() {
        for label in KEYPAD.iter().flatten() {
            assert!(Input::from_label(label).is_some(), "unmapped label {label}");
        }
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(input_for_key(gdk::Key::Return), Some(Input::Equals));
        assert_eq!(input_for_key(gdk::Key::KP_Enter), Some(Input::Equals));
        assert_eq!(input_for_key(gdk::Key::BackSpace), Some(Input::Backspace));
        assert_eq!(input_for_key(gdk::Key::Escape), Some(Input::Clear));
        assert_eq!(input_for_key(gdk::Key::Delete), Some(Input::Clear));
        assert_eq!(
            input_for_key(gdk::Key::KP_Multiply),
            Some(Input::Operator(Operator::Mul))
        );
    }

    #[test]
    fn test_typed_characters() {
        assert_eq!(input_for_char('4'), DigitKey::new(4).map(Input::Digit));
        assert_eq!(input_for_char('.'), Some(Input::Dot));
        assert_eq!(input_for_char(','), Some(Input::Dot));
        assert_eq!(input_for_char('='), Some(Input::Equals));
        assert_eq!(input_for_char('*'), Some(Input::Operator(Operator::Mul)));
        assert_eq!(input_for_char('/'), Some(Input::Operator(Operator::Div)));
        assert_eq!(input_for_char('-'), Some(Input::Operator(Operator::Sub)));
        assert_eq!(input_for_char('q'), None);
    }

    #[test]
    fn test_feedback_tone() {
        assert_eq!(feedback_tone(Input::Equals, false, true), Tone::Error);
        assert_eq!(feedback_tone(Input::Equals, false, false), Tone::Equals);
        // Still showing an earlier error: the key sounds normally.
        assert_eq!(feedback_tone(Input::Backspace, true, true), Tone::Minor);
        assert_eq!(feedback_tone(Input::Dot, true, false), Tone::Digit);
    }
}
