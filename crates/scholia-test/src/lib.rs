#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod dialog;
mod fixtures;

pub use dialog::{DialogCall, DialogLog, RecordingDialog};
pub use fixtures::{confirmed_annotation, init_tracing, mock_gateway, pending_annotation};
pub use scholia_gateway::mock::{
    DeferredReply, EntryFixture, MockTransport, entry, error_object, page,
};
