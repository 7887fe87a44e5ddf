use rocket::form::{self, FromFormField, ValueField};

/// literal some file-provider clients send in place of a numeric id to mean
/// "the root of the served subtree"
pub static ROOT_ITEM_IDENTIFIER: &str = "NSFileProviderRootContainerItemIdentifier";

/// an item reference from the query string: either a numeric index id or the
/// well-known root literal
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ItemId {
    Root,
    Id(i64),
}

impl<'v> FromFormField<'v> for ItemId {
    fn from_value(field: ValueField<'v>) -> form::Result<'v, Self> {
        if field.value == ROOT_ITEM_IDENTIFIER {
            return Ok(ItemId::Root);
        }
        match field.value.parse::<i64>() {
            Ok(id) => Ok(ItemId::Id(id)),
            Err(_) => Err(form::Error::validation("expected an item id").into()),
        }
    }
}

/// query parameters accepted by `GET /files`
#[derive(FromForm)]
pub struct ItemQuery<'r> {
    pub id: Option<ItemId>,
    pub cmd: Option<&'r str>,
    pub anchor: Option<i64>,
    pub count: Option<i64>,
}

/// query parameters accepted by `POST /files`
#[derive(FromForm)]
pub struct CreateItemQuery<'r> {
    #[field(name = "parentId")]
    pub parent_id: Option<ItemId>,
    pub name: Option<&'r str>,
    pub cmd: Option<&'r str>,
}

#[cfg(test)]
mod item_id_tests {
    use super::*;

    fn parse(value: &str) -> Option<ItemId> {
        ItemId::from_value(ValueField::from_value(value)).ok()
    }

    #[test]
    fn parses_numeric_ids() {
        assert_eq!(Some(ItemId::Id(42)), parse("42"));
    }

    #[test]
    fn parses_root_literal() {
        assert_eq!(
            Some(ItemId::Root),
            parse("NSFileProviderRootContainerItemIdentifier")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(None, parse("not-an-id"));
    }
}
