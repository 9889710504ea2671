use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::error::{ApiError, ValidationErrors};

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";

/// Rules for a text field.
#[derive(Clone, Copy, Debug)]
pub struct CharField {
    pub required: bool,
    pub allow_blank: bool,
    pub max_length: Option<usize>,
}

impl CharField {
    pub const fn required(max_length: usize) -> Self {
        Self {
            required: true,
            allow_blank: false,
            max_length: Some(max_length),
        }
    }

    pub const fn optional(max_length: Option<usize>) -> Self {
        Self {
            required: false,
            allow_blank: true,
            max_length,
        }
    }
}

/// Rules for a fixed-point number, as `(max_digits, decimal_places)`.
#[derive(Clone, Copy, Debug)]
pub struct DecimalField {
    pub max_digits: u32,
    pub decimal_places: u32,
}

enum Lookup {
    Missing,
    Null,
    Present(Value),
}

/// A JSON object being validated field by field. Errors accumulate instead
/// of stopping at the first bad field so a client sees every problem at once.
pub struct Form {
    inner: Map<String, Value>,
    prefix: String,
    partial: bool,
    errors: ValidationErrors,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

impl Form {
    /// `partial` forms (PATCH) never report missing required fields.
    pub fn from_data(data: Value, partial: bool) -> Result<Self, ApiError> {
        match data {
            Value::Object(inner) => Ok(Self {
                inner,
                prefix: String::new(),
                partial,
                errors: ValidationErrors::new(),
            }),
            other => Err(ApiError::invalid(
                "non_field_errors",
                &format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    type_name(&other)
                ),
            )),
        }
    }

    pub fn field_name(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    pub fn error(&mut self, key: &str, message: &str) {
        let field = self.field_name(key);
        self.errors.add(&field, message);
    }

    fn lookup(&mut self, key: &str, required: bool) -> Lookup {
        match self.inner.get(key).cloned() {
            None => {
                if required && !self.partial {
                    self.error(key, REQUIRED);
                }
                Lookup::Missing
            }
            Some(Value::Null) => Lookup::Null,
            Some(value) => Lookup::Present(value),
        }
    }

    fn present(&mut self, key: &str, required: bool) -> Option<Value> {
        match self.lookup(key, required) {
            Lookup::Missing => None,
            Lookup::Null => {
                self.error(key, NOT_NULL);
                None
            }
            Lookup::Present(value) => Some(value),
        }
    }

    fn check_text(&mut self, key: &str, value: String, rules: CharField) -> Option<String> {
        if value.is_empty() && !rules.allow_blank {
            self.error(key, NOT_BLANK);
            return None;
        }
        if let Some(max) = rules.max_length {
            if value.chars().count() > max {
                self.error(
                    key,
                    &format!("Ensure this field has no more than {max} characters."),
                );
                return None;
            }
        }
        Some(value)
    }

    fn as_text(&mut self, key: &str, value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.error(key, "Not a valid string.");
                None
            }
        }
    }

    pub fn string(&mut self, key: &str, rules: CharField) -> Option<String> {
        let value = self.present(key, rules.required)?;
        let value = self.as_text(key, value)?;
        self.check_text(key, value, rules)
    }

    /// Like [`Form::string`] but an explicit `null` is accepted and returned
    /// as `Some(None)`.
    pub fn nullable_string(&mut self, key: &str, rules: CharField) -> Option<Option<String>> {
        match self.lookup(key, rules.required) {
            Lookup::Missing => None,
            Lookup::Null => Some(None),
            Lookup::Present(value) => {
                let value = self.as_text(key, value)?;
                self.check_text(key, value, rules).map(Some)
            }
        }
    }

    pub fn integer(&mut self, key: &str, required: bool) -> Option<i32> {
        let value = self.present(key, required)?;
        let parsed = match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        match parsed.map(i32::try_from) {
            Some(Ok(v)) => Some(v),
            Some(Err(_)) => {
                self.error(key, "Ensure this value is within the integer range.");
                None
            }
            None => {
                self.error(key, "A valid integer is required.");
                None
            }
        }
    }

    pub fn decimal(&mut self, key: &str, rules: DecimalField, required: bool) -> Option<Decimal> {
        let value = self.present(key, required)?;
        match parse_decimal(&value, rules) {
            Ok(v) => Some(v),
            Err(message) => {
                self.error(key, &message);
                None
            }
        }
    }

    pub fn list(&mut self, key: &str) -> Option<Vec<Value>> {
        let value = self.present(key, false)?;
        match value {
            Value::Array(items) => Some(items),
            other => {
                self.error(
                    key,
                    &format!(
                        "Expected a list of items but got type \"{}\".",
                        type_name(&other)
                    ),
                );
                None
            }
        }
    }

    /// Opens a nested object under `key`. Errors found in the child are
    /// reported with this form's field path as prefix once absorbed.
    pub fn object(&mut self, key: &str, required: bool) -> Option<Form> {
        let value = self.present(key, required)?;
        let prefix = self.field_name(key);
        self.child(prefix, value)
    }

    /// Opens the `index`-th element of the list stored under `key`.
    pub fn element(&mut self, key: &str, index: usize, value: Value) -> Option<Form> {
        let prefix = format!("{}[{index}]", self.field_name(key));
        self.child(prefix, value)
    }

    fn child(&mut self, prefix: String, value: Value) -> Option<Form> {
        match value {
            Value::Object(inner) => Some(Form {
                inner,
                prefix,
                partial: false,
                errors: ValidationErrors::new(),
            }),
            other => {
                self.errors.add(
                    &prefix,
                    &format!(
                        "Invalid data. Expected a dictionary, but got {}.",
                        type_name(&other)
                    ),
                );
                None
            }
        }
    }

    pub fn absorb(&mut self, child: Form) {
        self.errors.merge(child.errors);
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

fn whole_digits(value: &Decimal) -> u32 {
    let whole = value.trunc().abs();
    if whole.is_zero() {
        0
    } else {
        whole.to_string().len() as u32
    }
}

/// Parses a JSON number or numeric string into a decimal that fits
/// `rules`, rescaled to exactly `decimal_places`.
pub fn parse_decimal(value: &Value, rules: DecimalField) -> Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return Err(String::from("A valid number is required.")),
    };
    let parsed = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| String::from("A valid number is required."))?;

    let normalized = parsed.normalize();
    let places = normalized.scale();
    let whole = whole_digits(&normalized);

    if whole + places > rules.max_digits {
        return Err(format!(
            "Ensure that there are no more than {} digits in total.",
            rules.max_digits
        ));
    }
    if places > rules.decimal_places {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            rules.decimal_places
        ));
    }
    if whole > rules.max_digits - rules.decimal_places {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            rules.max_digits - rules.decimal_places
        ));
    }

    let mut result = normalized;
    result.rescale(rules.decimal_places);
    Ok(result)
}

/// Parses `"1,2,3"` into ids.
pub fn parse_id_list(text: &str) -> Result<Vec<i64>, String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| format!("\"{s}\" is not a valid id."))
        })
        .collect()
}
