pub mod api;
pub mod create;
pub mod edit;
pub mod fork;
pub mod init;
pub mod list;
pub mod merge;
pub mod meta;
pub mod project;
pub mod publish;
pub mod show;
pub mod status;
pub mod submit;
pub mod term;
pub mod token;
