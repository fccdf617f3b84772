pub(crate) mod courses;
pub(crate) mod homework;
pub(crate) mod login_codes;
pub(crate) mod sessions;
pub(crate) mod submissions;
pub(crate) mod users;
