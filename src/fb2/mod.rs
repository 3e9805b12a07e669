mod cover;
mod reader;
mod writer;

pub use cover::scan_coverpage_href;
pub use reader::{
    MAX_DEPTH, decode, read_fb2, read_fb2_bytes, read_fb2_from_reader, read_fb2_from_zip,
    root_namespaces,
};
pub use writer::{encode, write_fb2, write_fb2_to_writer};
