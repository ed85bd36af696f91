use async_trait::async_trait;
use switchboard_core::{CallError, CallInfo, Fields};

/// Server-side implementation of one declared operation.
///
/// Reads input from `request`, writes output into `response`. Returning
/// `Ok(())` signals success; returning a declared exception (see
/// [`CallInfo::raise`]) signals a failure the client can match by name.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        request: &Fields,
        response: &mut Fields,
        call: &mut CallInfo,
    ) -> Result<(), CallError>;
}

/// Adapts a synchronous closure into a [`Handler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Fields, &mut Fields, &mut CallInfo) -> Result<(), CallError> + Send + Sync,
{
    async fn handle(
        &self,
        request: &Fields,
        response: &mut Fields,
        call: &mut CallInfo,
    ) -> Result<(), CallError> {
        (self.0)(request, response, call)
    }
}
