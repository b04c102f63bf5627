pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod comment;
pub use comment::{Comment, CommentId, NewComment, CONTENT_MAX_LEN, TOMBSTONE};

mod community;
pub use community::{Community, CommunityId, NewCommunity};

mod error;
pub use error::Error;

mod filter;
pub use filter::{FilterSpec, SortMode, TimeWindow};

mod post;
pub use post::{NewPost, Post, PostId, BODY_MAX_LEN, TITLE_MAX_LEN, TITLE_MIN_LEN};

mod store;
pub use store::Store;

mod user;
pub use user::{NewUser, User, UserId};

mod vote;
pub use vote::{Tally, Votable, VoteDirection, VoteSets};

pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

pub fn validate_text(s: &str, min: usize, max: usize) -> Result<(), Error> {
    validate_string(s)?;
    let len = s.chars().count();
    if len < min || len > max {
        return Err(Error::InvalidTextLength { len, min, max });
    }
    Ok(())
}

pub fn validate_time(t: &Time) -> Result<(), Error> {
    use chrono::Datelike;
    // timestamps outside this range do not round-trip through all the
    // serialization formats collaborators use
    if t.year() < 0 || t.year() > 9999 {
        return Err(Error::InvalidTime(*t));
    }
    Ok(())
}

pub fn midnight_on(
    date: chrono::NaiveDate,
    timezone: &chrono_tz::Tz,
) -> chrono::DateTime<chrono_tz::Tz> {
    use chrono::TimeZone;
    let mut naive = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid wall-clock time");
    loop {
        match timezone.from_local_datetime(&naive).earliest() {
            Some(t) => return t,
            // a DST transition can skip midnight entirely, probe the next hour
            None => naive = naive + chrono::Duration::hours(1),
        }
    }
}
