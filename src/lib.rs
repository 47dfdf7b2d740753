//! # htmlpress – static HTML → paginated PDF
//!
//! [`convert`] reads an HTML file, renders it through the engine below on a
//! worker thread and writes the PDF, reporting the outcome once. The engine
//! stages are:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`])
//! 2. **Style** – user-agent defaults, `<style>` rules and inline styles ([`style`])
//! 3. **Layout** – compute flexbox/grid layout with Taffy ([`layout`])
//! 4. **Paginate** – split into pages of the configured format ([`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! [`pipeline`] chains the stages and adds header/footer bands; [`options`]
//! resolves paper format, orientation and borders into a [`PageSetup`].

pub mod convert;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod options;
pub mod page_layout;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod resource;
pub mod style;

// Re-exports for convenience
pub use convert::{convert, Conversion, ConversionResult, Outcome, PendingConversion};
pub use error::{ConvertError, InputError, OptionsError, RenderError};
pub use options::{Band, Border, ConversionOptions, Orientation, PageSetup, PaperFormat};
pub use page_layout::DocumentLayout;
pub use pipeline::{layout_document, render_document, render_html, RenderContext, RenderedPdf};
