use crate::utils::thread_safety::{SendSafety, SyncSafety};

/// Callable taking one request, providers are erased into it
pub(crate) trait Service<Request> {
    type Response;
    type Error;

    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error>;
}

#[derive(Clone)]
pub(crate) struct FnService<F>(pub(crate) F);

impl<F, Request, Response, Error> Service<Request> for FnService<F>
where
    F: FnMut(Request) -> Result<Response, Error>,
{
    type Response = Response;
    type Error = Error;

    #[inline]
    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error> {
        self.0(request)
    }
}

/// Type-erased callable shared by every key a provider produces.
///
/// Cloning gives a callable with its own copy of the captured state.
pub(crate) struct BoxCloneService<Request, Response, Error>(
    pub(crate) Box<dyn CloneService<Request, Response = Response, Error = Error>>,
);

pub(crate) trait CloneService<Request>: Service<Request> + SendSafety + SyncSafety {
    #[must_use]
    fn clone_box(&self) -> Box<dyn CloneService<Request, Response = Self::Response, Error = Self::Error>>;
}

impl<Request, T> CloneService<Request> for T
where
    T: Service<Request> + Clone + SendSafety + SyncSafety + 'static,
{
    #[inline]
    fn clone_box(&self) -> Box<dyn CloneService<Request, Response = T::Response, Error = T::Error>> {
        Box::new(self.clone())
    }
}

impl<Request, Response, Error> Clone for BoxCloneService<Request, Response, Error> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl<Request, Response, Error> Service<Request> for BoxCloneService<Request, Response, Error> {
    type Response = Response;
    type Error = Error;

    #[inline]
    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error> {
        self.0.call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::{BoxCloneService, FnService, Service as _};

    use std::convert::Infallible;

    #[test]
    fn test_fn_service() {
        let mut service = FnService(|args: Vec<u8>| Ok::<_, Infallible>(args.len()));
        assert_eq!(service.call(vec![1, 2, 3]).unwrap(), 3);
    }

    #[test]
    fn test_clone_keeps_state_apart() {
        let mut counter = 0u8;
        let mut service = BoxCloneService(Box::new(FnService(move |step: u8| {
            counter += step;
            Ok::<_, Infallible>(counter)
        })));

        assert_eq!(service.call(1).unwrap(), 1);

        let mut cloned = service.clone();
        assert_eq!(cloned.call(1).unwrap(), 2);
        assert_eq!(service.call(5).unwrap(), 6);
    }
}
