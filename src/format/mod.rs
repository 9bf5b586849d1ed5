//! Backend page format and coordinate conversion.
//!
//! The backend stores annotations per page in the token source's native
//! coordinates; the engine keeps them in display coordinates. Everything
//! crossing that boundary goes through this module.

mod error;
mod page;
mod tokens;

pub use error::FormatError;
pub use page::{
    ObjectData, ObjectEntry, PageEntry, PageSerializer, data_attributes_from_api, pages_from_api,
};
pub use tokens::{native_sizes, text_inside, token_scale, tokens_by_pages};
