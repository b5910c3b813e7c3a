use crate::body::Body;

pub type Response<T = Body> = http::Response<T>;
