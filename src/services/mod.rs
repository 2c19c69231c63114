mod epub;
mod extractor;
mod mailer;
mod xhtml;

pub use epub::{slugify, BookMeta, Chapter, EpubAssembler, EpubWriter};
pub use extractor::{extract_readable, ArticleExtractor, ReadableExtractor};
pub use mailer::{compose, EpubFile, MailSender, Mailer};
pub use xhtml::xhtml_fragment;
