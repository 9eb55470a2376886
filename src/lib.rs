//! Page-assembly engine for PDF documents.
//!
//! Load source PDFs into a [`Session`], catalog their pages, edit an
//! [`AssemblyPlan`] (delete, restore, rotate, reorder, merge) and write the
//! kept pages out as one standalone PDF.
//!
//! ```no_run
//! use pagewright::{AssembleOptions, Session};
//!
//! # fn main() -> pagewright::Result<()> {
//! let mut session = Session::new();
//! let report = session.load_path("report.pdf")?;
//! let mut plan = session.new_plan(&[report])?;
//!
//! let uids = plan.kept_uids();
//! plan.delete(uids[1])?;
//! plan.rotate(uids[2], 90)?;
//!
//! let output = session.assemble(&plan, &AssembleOptions::default())?;
//! std::fs::write(&output.suggested_name, &output.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! Pages are always addressed by [`PageUid`], never by position, so handles
//! stay valid across any number of edits.

pub mod catalog;
pub mod error;
pub mod geometry;
pub mod plan;
pub mod serializer;
pub mod session;
pub mod store;

pub use catalog::{DocId, PageCatalog, PageEntry, PageUid};
pub use error::{Error, Result};
pub use geometry::{MediaBox, PageGeometry, Rotation};
pub use plan::{AssemblyPlan, SelectionEntry};
pub use serializer::{AssembleOptions, AssembledPdf};
pub use session::{RenderRequest, Session};
pub use store::SourceDocument;
