/// query parameters accepted by `GET /meta/<path..>`.
/// `enumerate` is a presence flag, so a bare `?enumerate` works.
#[derive(FromForm)]
pub struct EnumerateQuery<'r> {
    pub enumerate: Option<&'r str>,
    pub offset: Option<usize>,
    pub count: Option<usize>,
}

impl EnumerateQuery<'_> {
    pub fn wants_listing(&self) -> bool {
        self.enumerate.is_some()
    }
}
