mod messages;
mod support;
