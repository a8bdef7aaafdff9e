//! Cell formatters and the per-table formatter registry.
//!
//! A column's `format` option names a formatter registered here. The
//! formatter receives the raw field value and the column's resolved
//! `format_options` tree.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::options::OptionTree;
use crate::value::Value;

/// Renders one raw value as cell text.
pub trait Formatter: Send + Sync {
    fn format(&self, value: &Value, options: &OptionTree) -> String;
}

impl<F> Formatter for F
where
    F: Fn(&Value, &OptionTree) -> String + Send + Sync,
{
    fn format(&self, value: &Value, options: &OptionTree) -> String {
        self(value, options)
    }
}

/// Named formatters available to a table's columns.
#[derive(Clone)]
pub struct FormatterRegistry {
    formatters: IndexMap<String, Arc<dyn Formatter>>,
}

impl FormatterRegistry {
    /// An empty registry. Columns without a render block will fail to
    /// declare until at least `plain` is registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            formatters: IndexMap::new(),
        }
    }

    /// Registry holding the built-in `plain`, `boolean` and `currency` formatters.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("plain", PlainFormatter);
        registry.register("boolean", BooleanFormatter);
        registry.register("currency", CurrencyFormatter);
        registry
    }

    /// Registers (or replaces) a formatter under `name`.
    pub fn register(&mut self, name: impl Into<String>, formatter: impl Formatter + 'static) {
        self.formatters.insert(name.into(), Arc::new(formatter));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formatters.keys().map(String::as_str)
    }

    /// Formats `value` with the formatter named `name`, falling back to
    /// plain display text when no such formatter exists.
    #[must_use]
    pub fn format(&self, name: &str, value: &Value, options: &OptionTree) -> String {
        match self.formatters.get(name) {
            Some(formatter) => formatter.format(value, options),
            None => value.to_string(),
        }
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.formatters.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in formatters
// ---------------------------------------------------------------------------

/// Display text of the raw value. `Null` renders empty.
#[derive(Debug, Clone, Copy)]
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format(&self, value: &Value, _options: &OptionTree) -> String {
        value.to_string()
    }
}

/// `Yes` / `No` rendering of a value's truthiness.
///
/// Options: `style` = `"inverse"` or `"reverse"` negates the value;
/// `true_label` / `false_label` replace the default labels.
#[derive(Debug, Clone, Copy)]
pub struct BooleanFormatter;

impl Formatter for BooleanFormatter {
    fn format(&self, value: &Value, options: &OptionTree) -> String {
        let mut truthy = value.is_truthy();
        if matches!(options.str("style"), Some("inverse" | "reverse")) {
            truthy = !truthy;
        }
        let label = if truthy {
            options.str("true_label").unwrap_or("Yes")
        } else {
            options.str("false_label").unwrap_or("No")
        };
        label.to_string()
    }
}

/// Currency rendering with grouped thousands, e.g. `$1,234.50`.
///
/// Options: `unit` (`"$"`), `precision` (`2`), `delimiter` (`","`),
/// `separator` (`"."`). Values that are not numeric render as plain text.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyFormatter;

impl Formatter for CurrencyFormatter {
    fn format(&self, value: &Value, options: &OptionTree) -> String {
        let Some(amount) = value.as_f64() else {
            return value.to_string();
        };
        let unit = options.str("unit").unwrap_or("$");
        let delimiter = options.str("delimiter").unwrap_or(",");
        let separator = options.str("separator").unwrap_or(".");
        let precision = precision_option(options);

        let fixed = format!("{:.*}", precision, amount.abs());
        let (whole, fraction) = match fixed.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (fixed.as_str(), None),
        };

        let mut out = String::new();
        // Avoid "-$0.00" for values that round to zero.
        if amount < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.push('-');
        }
        out.push_str(unit);
        out.push_str(&group_thousands(whole, delimiter));
        if let Some(fraction) = fraction {
            out.push_str(separator);
            out.push_str(fraction);
        }
        out
    }
}

/// Upper bound on fraction digits for [`CurrencyFormatter`].
pub const MAX_PRECISION: usize = 10;

/// `precision` as a digit count: integral numbers only, negatives read as
/// zero, anything else falls back to 2. Clamped to [`MAX_PRECISION`].
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn precision_option(options: &OptionTree) -> usize {
    let requested = match options.value("precision") {
        Some(Value::Int(p)) => usize::try_from(*p).unwrap_or(0),
        Some(Value::Float(p)) if p.is_finite() && p.fract() == 0.0 => {
            p.clamp(0.0, MAX_PRECISION as f64) as usize
        }
        _ => 2,
    };
    requested.min(MAX_PRECISION)
}

fn group_thousands(digits: &str, delimiter: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * delimiter.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(delimiter);
        }
        out.push(ch);
    }
    out
}
