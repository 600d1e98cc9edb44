use limbo_derive::limbo_error;
use std::borrow::Cow;

#[limbo_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Name rejected{}: {message}", format_context(.context))]
    Rejected { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open() -> Result<std::fs::File, DemoError> {
    std::fs::File::open("/definitely/missing").context("Opening demo file")
}

fn main() {
    let err = open().unwrap_err();
    assert_eq!(err.kind(), "Io");
    assert!(err.to_string().contains("(Opening demo file)"));

    let err: DemoError = "boom".into();
    assert_eq!(err.kind(), "Internal");

    let rejected: Result<(), DemoError> =
        Err(DemoError::Rejected { message: "CON".into(), context: None });
    let err = rejected.context("reserved").unwrap_err();
    assert_eq!(err.to_string(), "Name rejected (reserved): CON");
}
