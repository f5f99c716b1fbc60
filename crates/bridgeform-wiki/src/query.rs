//! Fixed table queries used by dashboard widgets.
//!
//! Every query is a plain string template over a table id. The table id is
//! substituted verbatim (no validation of its format).

use std::fmt;
use std::str::FromStr;

use crate::error::{LayoutError, Result};

/// The closed set of query shapes a layout cell may reference by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    LastUpdate,
    Users,
    AndroidUsers,
    IosUsers,
    Activities,
    PassiveContributors,
    ActivityByWeek,
    ActivityByHour,
    ActiveUsersPerDate,
}

impl QueryKind {
    pub const ALL: [QueryKind; 9] = [
        QueryKind::LastUpdate,
        QueryKind::Users,
        QueryKind::AndroidUsers,
        QueryKind::IosUsers,
        QueryKind::Activities,
        QueryKind::PassiveContributors,
        QueryKind::ActivityByWeek,
        QueryKind::ActivityByHour,
        QueryKind::ActiveUsersPerDate,
    ];

    /// Name used in layout documents (`query_funs`).
    pub fn name(self) -> &'static str {
        match self {
            QueryKind::LastUpdate => "get_last_update",
            QueryKind::Users => "get_n_users",
            QueryKind::AndroidUsers => "get_n_android_users",
            QueryKind::IosUsers => "get_n_ios_users",
            QueryKind::Activities => "get_n_activities",
            QueryKind::PassiveContributors => "get_n_passive_contributors",
            QueryKind::ActivityByWeek => "get_activity_by_week",
            QueryKind::ActivityByHour => "get_activity_by_hour",
            QueryKind::ActiveUsersPerDate => "get_active_users_per_date",
        }
    }

    pub fn sql(self, table_id: &str) -> String {
        match self {
            QueryKind::LastUpdate => {
                format!("select max(uploadDate) as `Last Update` FROM {table_id}")
            }
            QueryKind::Users => {
                format!("select count(distinct healthCode) as `Participants` FROM {table_id}")
            }
            QueryKind::AndroidUsers => format!(
                "SELECT COUNT(DISTINCT healthCode) as `Android Users` FROM {table_id} \
                 WHERE ((phoneInfo not like '%iPhone%') AND (phoneInfo<>'SmsLogHealthDataBackfill') \
                 AND (phoneInfo<>'Bridge Server'))"
            ),
            QueryKind::IosUsers => format!(
                "select count(distinct healthCode) as `IOS Users` FROM {table_id} \
                 where phoneInfo not like '%iPhone%'"
            ),
            QueryKind::Activities => {
                format!("SELECT count(distinct recordId) as `Activities` FROM {table_id}")
            }
            QueryKind::PassiveContributors => format!(
                "SELECT count(distinct healthCode) as `Passive Contributors` FROM {table_id} \
                 WHERE dataGroups NOT LIKE '%test%' and originalTable like '%Passive%'"
            ),
            QueryKind::ActivityByWeek => format!(
                "select week(FROM_UNIXTIME(`createdOn`/1000)) as `week`, count(*) as `activities` \
                 from {table_id} WHERE dataGroups NOT LIKE '%test%' GROUP BY `week` ORDER BY originalTable"
            ),
            QueryKind::ActivityByHour => format!(
                "select hour(FROM_UNIXTIME(`createdOn`/1000)) as `t`, count(recordId) as `activities` \
                 from {table_id} WHERE dataGroups NOT LIKE '%test%'GROUP BY `t`"
            ),
            QueryKind::ActiveUsersPerDate => format!(
                "select `uploadDate`, count(distinct healthCode) as activities from {table_id} \
                 WHERE dataGroups NOT LIKE '%test%' GROUP BY uploadDate ORDER BY originalTable"
            ),
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueryKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        QueryKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| LayoutError::UnknownQuery {
                name: s.to_string(),
            })
    }
}

/// Resolve a query function by name and render it for `table_id`.
pub fn build_query(name: &str, table_id: &str) -> Result<String> {
    Ok(name.parse::<QueryKind>()?.sql(table_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_query_matches_dashboard_text() {
        assert_eq!(
            build_query("get_n_users", "syn123").unwrap(),
            "select count(distinct healthCode) as `Participants` FROM syn123"
        );
    }

    #[test]
    fn continuation_lines_keep_single_spaces() {
        let sql = QueryKind::AndroidUsers.sql("syn9");
        assert_eq!(
            sql,
            "SELECT COUNT(DISTINCT healthCode) as `Android Users` FROM syn9 WHERE ((phoneInfo not like \
             '%iPhone%') AND (phoneInfo<>'SmsLogHealthDataBackfill') AND (phoneInfo<>'Bridge Server'))"
        );
        assert_eq!(
            QueryKind::IosUsers.sql("syn9"),
            "select count(distinct healthCode) as `IOS Users` FROM syn9 where phoneInfo not like '%iPhone%'"
        );
        assert_eq!(
            QueryKind::ActivityByHour.sql("syn9"),
            "select hour(FROM_UNIXTIME(`createdOn`/1000)) as `t`, count(recordId) as `activities` \
             from syn9 WHERE dataGroups NOT LIKE '%test%'GROUP BY `t`"
        );
    }

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in QueryKind::ALL {
            assert_eq!(kind.name().parse::<QueryKind>().unwrap(), kind);
            assert!(kind.sql("syn42").contains("syn42"), "{kind} must embed the table id");
        }
    }

    #[test]
    fn queries_are_deterministic() {
        for kind in QueryKind::ALL {
            assert_eq!(kind.sql("syn7"), kind.sql("syn7"));
        }
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = build_query("get_n_dogs", "syn1").unwrap_err();
        assert!(matches!(err, LayoutError::UnknownQuery { ref name } if name == "get_n_dogs"));
    }
}
