mod event;

pub(crate) use event::EventMessageParser;
