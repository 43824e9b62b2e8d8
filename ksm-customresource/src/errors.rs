pub use ksm_core::errors::{Error, Regex, RegexBuilder, anyhow, bail, ensure, err_impl, paste, skerr};
