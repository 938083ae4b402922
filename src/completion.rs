use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::error::StreamError;
use crate::model::Message;

/// Text fragments of one reply, in the order the service produced them.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>>>>;

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<CompletionStream, StreamError>> + 'a>>;

/// Opens a streaming chat completion for a full conversation.
pub trait CompletionService {
    fn stream_chat<'a>(&'a self, messages: &'a [Message]) -> CompletionFuture<'a>;
}

impl<T: CompletionService + ?Sized> CompletionService for Box<T> {
    fn stream_chat<'a>(&'a self, messages: &'a [Message]) -> CompletionFuture<'a> {
        (**self).stream_chat(messages)
    }
}
