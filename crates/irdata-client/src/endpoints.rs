//! Data endpoint paths used by the convenience methods.

/// Full car catalogue; answers with a link to a static file.
pub const CAR_GET: &str = "/data/car/get";

/// Full track catalogue; answers with a link to a static file.
pub const TRACK_GET: &str = "/data/track/get";

/// Chart data (iRating, safety rating, ...) for one member.
pub const MEMBER_CHART_DATA: &str = "/data/member/chart_data";

/// Self-description of every data endpoint.
pub const DOC: &str = "/data/doc";
