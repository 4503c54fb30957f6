use crate::error::CalcError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;
use tracing::{trace, warn};

/// Text shown in the display after a failed calculation.
pub const ERROR_MARKER: &str = "Error";

/// Significant digits kept by `+ - ×` and by exact division.
const PRECISION: u32 = 16;
/// Fractional digits kept when a quotient does not terminate.
const FALLBACK_SCALE: u32 = 12;
const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '×',
            Operator::Div => '÷',
        }
    }

    /// Accepts the keypad glyphs as well as the usual ASCII stand-ins.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' | '−' => Some(Operator::Sub),
            '×' | '*' | 'x' | 'X' => Some(Operator::Mul),
            '÷' | '/' => Some(Operator::Div),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

const DIGIT_TOKENS: [&str; 11] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "00"];

/// A digit key: one of `0`..`9` or the `00` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitKey(u8);

impl DigitKey {
    pub const DOUBLE_ZERO: DigitKey = DigitKey(10);

    pub fn new(digit: u8) -> Option<Self> {
        (digit <= 9).then_some(DigitKey(digit))
    }

    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(10).and_then(|d| DigitKey::new(d as u8))
    }

    pub fn as_str(self) -> &'static str {
        DIGIT_TOKENS[self.0 as usize]
    }

    fn is_zero(self) -> bool {
        self.0 == 0 || self == Self::DOUBLE_ZERO
    }
}

/// One discrete event coming from the keypad or the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Digit(DigitKey),
    Dot,
    Operator(Operator),
    Equals,
    Clear,
    Backspace,
}

impl Input {
    /// Maps a keypad button label to its event.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "00" => Some(Input::Digit(DigitKey::DOUBLE_ZERO)),
            "." => Some(Input::Dot),
            "=" => Some(Input::Equals),
            "C" => Some(Input::Clear),
            "⌫" => Some(Input::Backspace),
            _ => {
                let mut chars = label.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                DigitKey::from_char(c)
                    .map(Input::Digit)
                    .or_else(|| Operator::from_symbol(c).map(Input::Operator))
            }
        }
    }
}

type ErrorHandler = Box<dyn FnMut(&str)>;

/// Four-function calculator state machine.
///
/// The display text doubles as the numeral being typed. Every handler
/// returns the text the shell should show next.
pub struct Calculator {
    display: String,
    stored: Option<Decimal>,
    pending: Option<Operator>,
    start_new_number: bool,
    on_error: Option<ErrorHandler>,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Calculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calculator")
            .field("display", &self.display)
            .field("stored", &self.stored)
            .field("pending", &self.pending)
            .field("start_new_number", &self.start_new_number)
            .finish_non_exhaustive()
    }
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            display: "0".to_string(),
            stored: None,
            pending: None,
            start_new_number: true,
            on_error: None,
        }
    }

    /// Registers the callback told about arithmetic failures, e.g. to pop up a dialog.
    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.on_error = Some(Box::new(handler));
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn stored_operand(&self) -> Option<Decimal> {
        self.stored
    }

    pub fn pending_operator(&self) -> Option<Operator> {
        self.pending
    }

    pub fn starts_new_number(&self) -> bool {
        self.start_new_number
    }

    pub fn is_error(&self) -> bool {
        self.display == ERROR_MARKER
    }

    pub fn handle(&mut self, input: Input) -> &str {
        trace!(?input, "calculator input");
        match input {
            Input::Digit(key) => self.handle_digit(key),
            Input::Dot => self.handle_dot(),
            Input::Operator(op) => self.handle_operator(op),
            Input::Equals => self.handle_equals(),
            Input::Clear => self.handle_clear(),
            Input::Backspace => self.handle_backspace(),
        }
    }

    pub fn handle_digit(&mut self, key: DigitKey) -> &str {
        if self.start_new_number {
            let token = if key.is_zero() { "0" } else { key.as_str() };
            self.replace_display(token);
            self.start_new_number = false;
        } else {
            let candidate = if self.display == "0" {
                key.as_str().to_string()
            } else {
                format!("{}{}", self.display, key.as_str())
            };
            // Drop keys that would take the numeral past what `Decimal` holds.
            if parse_numeral(&candidate).is_ok() {
                self.display = candidate;
            } else {
                trace!(display = %self.display, "digit ignored, numeral full");
            }
        }
        &self.display
    }

    pub fn handle_dot(&mut self) -> &str {
        if self.start_new_number {
            self.replace_display("0.");
            self.start_new_number = false;
        } else if !self.display.contains('.') {
            self.display.push('.');
        }
        &self.display
    }

    pub fn handle_operator(&mut self, op: Operator) -> &str {
        if let Err(err) = self.try_operator(op) {
            self.fail(err);
        }
        &self.display
    }

    pub fn handle_equals(&mut self) -> &str {
        if let Err(err) = self.try_equals() {
            self.fail(err);
        }
        &self.display
    }

    pub fn handle_clear(&mut self) -> &str {
        self.reset();
        self.replace_display("0");
        &self.display
    }

    pub fn handle_backspace(&mut self) -> &str {
        if self.start_new_number {
            return &self.display;
        }
        if self.display.chars().count() <= 1 {
            self.reset_entry();
            return &self.display;
        }
        self.display.pop();
        if self.display.is_empty() || self.display == "-" {
            self.reset_entry();
        }
        &self.display
    }

    fn try_operator(&mut self, op: Operator) -> Result<(), CalcError> {
        let current = self.parse_display()?;
        match self.stored {
            None => self.stored = Some(current),
            // A fresh right operand was typed: fold it in right away.
            Some(left) if !self.start_new_number => {
                let value = match self.pending {
                    Some(pending) => apply(left, current, pending)?,
                    None => current,
                };
                self.stored = Some(value);
                self.replace_display(&format_result(value));
            }
            // Operator pressed twice in a row: only swap it.
            Some(_) => {}
        }
        self.pending = Some(op);
        self.start_new_number = true;
        Ok(())
    }

    fn try_equals(&mut self) -> Result<(), CalcError> {
        let (Some(left), Some(op)) = (self.stored, self.pending) else {
            return Ok(());
        };
        let right = self.parse_display()?;
        let value = apply(left, right, op)?;
        self.stored = Some(value);
        self.replace_display(&format_result(value));
        self.pending = None;
        self.start_new_number = true;
        Ok(())
    }

    fn parse_display(&self) -> Result<Decimal, CalcError> {
        if self.is_error() {
            return Ok(Decimal::ZERO);
        }
        parse_numeral(&self.display)
    }

    fn fail(&mut self, err: CalcError) {
        warn!(error = %err, "calculation failed");
        self.reset();
        self.replace_display(ERROR_MARKER);
        let message = err.to_string();
        if let Some(handler) = self.on_error.as_mut() {
            handler(&message);
        }
    }

    fn reset(&mut self) {
        self.stored = None;
        self.pending = None;
        self.start_new_number = true;
    }

    fn reset_entry(&mut self) {
        self.replace_display("0");
        self.start_new_number = true;
    }

    fn replace_display(&mut self, text: &str) {
        self.display.clear();
        self.display.push_str(text);
    }
}

/// Parses display text; a bare or trailing dot counts as no fraction.
fn parse_numeral(text: &str) -> Result<Decimal, CalcError> {
    let text = text.strip_suffix('.').unwrap_or(text);
    if text.is_empty() || text == "-" {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(text).map_err(|_| CalcError::Overflow)
}

/// Applies `op` to `a` and `b`.
///
/// `+ - ×` round to 16 significant digits, half up. Division is kept at that
/// precision when the quotient is exact there, otherwise it is rounded to
/// 12 fractional digits.
pub fn apply(a: Decimal, b: Decimal, op: Operator) -> Result<Decimal, CalcError> {
    let raw = match op {
        Operator::Add => a.checked_add(b),
        Operator::Sub => a.checked_sub(b),
        Operator::Mul => a.checked_mul(b),
        Operator::Div => return divide(a, b),
    };
    raw.and_then(round_to_precision).ok_or(CalcError::Overflow)
}

fn divide(a: Decimal, b: Decimal) -> Result<Decimal, CalcError> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    let quotient = a.checked_div(b).ok_or(CalcError::Overflow)?;
    let rounded = round_to_precision(quotient).ok_or(CalcError::Overflow)?;
    if rounded == quotient && rounded.checked_mul(b) == Some(a) {
        Ok(rounded)
    } else {
        Ok(quotient.round_dp_with_strategy(FALLBACK_SCALE, ROUNDING))
    }
}

fn round_to_precision(value: Decimal) -> Option<Decimal> {
    if value.is_zero() {
        return Some(Decimal::ZERO);
    }
    value.round_sf_with_strategy(PRECISION, ROUNDING)
}

/// Plain decimal notation without trailing fractional zeros.
pub fn format_result(value: Decimal) -> String {
    value.normalize().to_string()
}
