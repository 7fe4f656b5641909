pub use eyre::Result;

pub mod codec;
pub mod page;
pub mod table;

pub use codec::{DecodeError, MalformedTable, TableSet};
pub use page::{Document, Extract, Fetch, FetchError, InvalidDocument, Page};
pub use table::{thousands, FrequencyTable, RankedTable, WordCount};
