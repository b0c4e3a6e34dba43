use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("invalid conversation id: {reason}")]
    InvalidConversationId { reason: &'static str },
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can be built from a plain message.
///
/// Pair with [`impl_context!`] to get `.context()` / `.with_context()` on
/// results in that crate.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait for `Result<T, E: Display>`.
///
/// Expects `Error: FromMessage` and `Result<T>` in scope at the call site:
///
/// ```ignore
/// keyflow_common::impl_context!();
///
/// let options = url.parse().context("invalid database url")?;
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let context = context.into();
                self.with_context(|| context)
            }

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|err| {
                    <Error as $crate::FromMessage>::from_message(format!("{}: {err}", f().into()))
                })
            }
        }
    };
}
