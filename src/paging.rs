use crate::error::AppError;

/// `LIMIT`/`OFFSET` pair derived from the `limit` and `page` query params.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Pages are 1-based: `offset = limit * (page - 1)`. A page without a limit
/// is ignored since the page size is unknown.
pub fn window(limit: Option<i64>, page: Option<i64>) -> Result<Window, AppError> {
    if matches!(limit, Some(l) if l < 1) {
        return Err(AppError::BadRequest("limit must be at least 1".into()));
    }
    if matches!(page, Some(p) if p < 1) {
        return Err(AppError::BadRequest("page must be at least 1".into()));
    }
    let offset = match (limit, page) {
        (Some(l), Some(p)) => Some(l.saturating_mul(p - 1)),
        _ => None,
    };
    Ok(Window { limit, offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_to_offset() {
        assert_eq!(
            window(Some(10), Some(3)).unwrap(),
            Window {
                limit: Some(10),
                offset: Some(20)
            }
        );
        assert_eq!(
            window(Some(10), Some(1)).unwrap(),
            Window {
                limit: Some(10),
                offset: Some(0)
            }
        );
    }

    #[test]
    fn missing_params() {
        assert_eq!(window(None, None).unwrap(), Window::default());
        assert_eq!(window(None, Some(4)).unwrap(), Window::default());
        assert_eq!(
            window(Some(5), None).unwrap(),
            Window {
                limit: Some(5),
                offset: None
            }
        );
    }

    #[test]
    fn rejects_non_positive_values() {
        assert!(window(Some(0), None).is_err());
        assert!(window(Some(10), Some(0)).is_err());
        assert!(window(Some(-1), Some(2)).is_err());
    }
}
