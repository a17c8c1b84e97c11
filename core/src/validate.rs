//! Response validation capability.
//!
//! A `Validator` receives the decoded JSON body and either produces the typed
//! value the caller wants or a human-readable summary of what is wrong with
//! it. The executor does not care how the check is done.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

pub trait Validator {
    type Output;

    fn parse(&self, value: &Value) -> Result<Self::Output, String>;
}

impl<V: Validator + ?Sized> Validator for &V {
    type Output = V::Output;

    fn parse(&self, value: &Value) -> Result<Self::Output, String> {
        (**self).parse(value)
    }
}

/// Accepts any body as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unvalidated;

impl Validator for Unvalidated {
    type Output = Value;

    fn parse(&self, value: &Value) -> Result<Value, String> {
        Ok(value.clone())
    }
}

/// Accepts bodies that deserialize into `T`.
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> Typed<T> {
    pub fn new() -> Self {
        Typed(PhantomData)
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Validator for Typed<T> {
    type Output = T;

    fn parse(&self, value: &Value) -> Result<T, String> {
        T::deserialize(value).map_err(|e| e.to_string())
    }
}

/// Deserializes into `T`, then applies its `validator::Validate` rules.
pub struct Schema<T>(PhantomData<fn() -> T>);

impl<T> Schema<T> {
    pub fn new() -> Self {
        Schema(PhantomData)
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned + Validate> Validator for Schema<T> {
    type Output = T;

    fn parse(&self, value: &Value) -> Result<T, String> {
        let parsed = T::deserialize(value).map_err(|e| e.to_string())?;
        parsed.validate().map_err(|errors| summarize(&errors))?;
        Ok(parsed)
    }
}

fn summarize(errors: &validator::ValidationErrors) -> String {
    let mut problems: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: failed {}", e.code),
            })
        })
        .collect();
    problems.sort();
    if problems.is_empty() {
        errors.to_string()
    } else {
        problems.join("; ")
    }
}

/// Validator backed by a closure.
pub struct FnValidator<F>(F);

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

pub fn from_fn<T, F>(f: F) -> FnValidator<F>
where
    F: Fn(&Value) -> Result<T, String>,
{
    FnValidator(f)
}

impl<T, F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> Result<T, String>,
{
    type Output = T;

    fn parse(&self, value: &Value) -> Result<T, String> {
        (self.0)(value)
    }
}
