//! A custom account for account-abstraction chains that breaks the validation isolation rules on
//! its first transaction, together with the bootloader, system contracts and in-memory VM needed
//! to run it.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;
pub mod interfaces;
pub mod system;

mod account;
pub use account::*;

mod bootloader;
pub use bootloader::*;

mod call;
pub use call::*;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod transaction;
pub use transaction::*;

mod vm;
pub use vm::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
