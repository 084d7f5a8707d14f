//! Fixed-schema row and its byte-exact serialization.
//!
//! The schema is hardcoded to three columns, per the spec: `id`, `username`
//! and `email`. Every serialized row occupies exactly [`ROW_SIZE`] bytes so
//! that leaf cells have a uniform size.
use crate::err;
use crate::errors::Error;

pub const USERNAME_MAX: usize = 32;
pub const EMAIL_MAX: usize = 255;

const ID_SIZE: usize = 4;
const USERNAME_SIZE: usize = USERNAME_MAX + 1;
const EMAIL_SIZE: usize = EMAIL_MAX + 1;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Total size in bytes of one serialized row.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// One record: a `u32` key plus two null-padded fixed-width text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Builds a row from user-supplied strings, rejecting text that
    /// overflows its fixed column width.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, Error> {
        if username.len() > USERNAME_MAX {
            return Err(Error::StringTooLong {
                field: "username",
                max: USERNAME_MAX,
            });
        }
        if email.len() > EMAIL_MAX {
            return Err(Error::StringTooLong {
                field: "email",
                max: EMAIL_MAX,
            });
        }
        Ok(Row {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }
}

/// Copies `row` into `dst` at fixed byte offsets. `dst` must be at least
/// [`ROW_SIZE`] bytes long.
pub fn serialize(row: &Row, dst: &mut [u8]) {
    debug_assert!(dst.len() >= ROW_SIZE);
    dst[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&row.id.to_le_bytes());

    let username_bytes = row.username.as_bytes();
    dst[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].fill(0);
    dst[USERNAME_OFFSET..USERNAME_OFFSET + username_bytes.len()].copy_from_slice(username_bytes);

    let email_bytes = row.email.as_bytes();
    dst[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].fill(0);
    dst[EMAIL_OFFSET..EMAIL_OFFSET + email_bytes.len()].copy_from_slice(email_bytes);
}

/// Reconstructs a `Row` from a [`ROW_SIZE`]-byte slice written by [`serialize`].
pub fn deserialize(src: &[u8]) -> Result<Row, Error> {
    debug_assert!(src.len() >= ROW_SIZE);
    let id_bytes: [u8; ID_SIZE] = src[ID_OFFSET..ID_OFFSET + ID_SIZE]
        .try_into()
        .map_err(|_| err!("Failed to decode row id"))?;
    let id = u32::from_le_bytes(id_bytes);

    let username = decode_padded(&src[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
    let email = decode_padded(&src[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);

    Ok(Row {
        id,
        username,
        email,
    })
}

fn decode_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let row = Row::new(1, "alice", "alice@example.com").unwrap();
        let mut buf = [0u8; ROW_SIZE];
        serialize(&row, &mut buf);
        let decoded = deserialize(&buf).unwrap();
        assert_eq!(row, decoded);
    }

    #[test]
    fn username_exactly_max_is_accepted() {
        let username = "a".repeat(USERNAME_MAX);
        let row = Row::new(1, &username, "a@x.com").unwrap();
        let mut buf = [0u8; ROW_SIZE];
        serialize(&row, &mut buf);
        assert_eq!(deserialize(&buf).unwrap().username, username);
    }

    #[test]
    fn username_one_over_max_is_rejected() {
        let username = "a".repeat(USERNAME_MAX + 1);
        let err = Row::new(1, &username, "a@x.com").unwrap_err();
        assert!(matches!(
            err,
            Error::StringTooLong {
                field: "username",
                ..
            }
        ));
    }

    #[test]
    fn email_exactly_max_is_accepted() {
        let email = "a".repeat(EMAIL_MAX);
        assert!(Row::new(1, "bob", &email).is_ok());
    }

    #[test]
    fn email_one_over_max_is_rejected() {
        let email = "a".repeat(EMAIL_MAX + 1);
        let err = Row::new(1, "bob", &email).unwrap_err();
        assert!(matches!(err, Error::StringTooLong { field: "email", .. }));
    }

    #[test]
    fn row_size_is_fixed() {
        assert_eq!(ROW_SIZE, 4 + 33 + 256);
    }
}
