use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::store::GrantStore;
use crate::types::{GrantId, PermissionId, ResourceId, ResourceType, UserId};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::BTreeSet;
use tracing::debug;

/// Kind of time-based grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeGrantKind {
    /// Single window, typically an elevated-access grant.
    Temporary,
    /// Single window planned ahead of time.
    Scheduled,
    /// Window further restricted by a recurring [`Schedule`].
    Recurring,
}

/// Recurrence constraints, evaluated in UTC.
///
/// An empty set leaves its dimension unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Schedule {
    /// Days of week, 0 = Sunday through 6 = Saturday.
    pub days_of_week: BTreeSet<u32>,
    /// Hours of day, 0 to 23.
    pub hours: BTreeSet<u32>,
    /// Months, 0 = January through 11 = December.
    pub months: BTreeSet<u32>,
    /// Days of month, 1 to 31.
    pub days_of_month: BTreeSet<u32>,
}

impl Schedule {
    /// Returns whether `at` satisfies every declared dimension.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        fn allows(set: &BTreeSet<u32>, value: u32) -> bool {
            set.is_empty() || set.contains(&value)
        }

        allows(&self.days_of_week, at.weekday().num_days_from_sunday())
            && allows(&self.hours, at.hour())
            && allows(&self.months, at.month0())
            && allows(&self.days_of_month, at.day())
    }
}

/// Standing time-windowed grant of a permission to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeBasedPermission {
    /// Grant identifier.
    pub id: GrantId,
    /// Grantee.
    pub user: UserId,
    /// Granted permission.
    pub permission: PermissionId,
    /// Resource type the grant is narrowed to.
    pub resource_type: Option<ResourceType>,
    /// Resource instance the grant is narrowed to.
    pub resource_id: Option<ResourceId>,
    /// Grant kind.
    pub kind: TimeGrantKind,
    /// Window start, inclusive.
    pub start: DateTime<Utc>,
    /// Window end, inclusive. Open-ended when unset.
    pub end: Option<DateTime<Utc>>,
    /// Recurrence constraints, consulted for recurring grants.
    pub schedule: Option<Schedule>,
    /// Soft-deactivation flag.
    pub is_active: bool,
}

impl TimeBasedPermission {
    /// Creates an active, global grant of `kind` starting at `start`.
    pub fn new(
        id: GrantId,
        user: UserId,
        permission: PermissionId,
        kind: TimeGrantKind,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user,
            permission,
            resource_type: None,
            resource_id: None,
            kind,
            start,
            end: None,
            schedule: None,
            is_active: true,
        }
    }

    /// Sets the window end.
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets the recurrence schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Narrows the grant to one resource.
    pub fn for_resource(mut self, resource_type: ResourceType, resource_id: ResourceId) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id);
        self
    }

    /// Sets the active flag.
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns whether the grant is in force at `at`.
    pub fn in_window(&self, at: DateTime<Utc>) -> bool {
        if !self.is_active || at < self.start {
            return false;
        }
        if self.end.is_some_and(|end| at > end) {
            return false;
        }
        match self.kind {
            TimeGrantKind::Temporary | TimeGrantKind::Scheduled => true,
            TimeGrantKind::Recurring => self
                .schedule
                .as_ref()
                .is_none_or(|schedule| schedule.matches(at)),
        }
    }
}

/// Evaluates time-windowed grants.
pub(crate) async fn evaluate<S>(
    store: &S,
    user: &UserId,
    permission: &PermissionId,
    resource: &Resource,
    at: DateTime<Utc>,
) -> Result<Option<GrantId>>
where
    S: GrantStore + Sync + ?Sized,
{
    let rows = store
        .time_based_permissions(user, permission)
        .await
        .map_err(Error::from)?;

    let granted = rows
        .into_iter()
        .find(|row| {
            resource.admits(row.resource_type.as_ref(), row.resource_id.as_ref())
                && row.in_window(at)
        })
        .map(|row| row.id);
    debug!(user = %user, permission = %permission, granted = ?granted, "evaluated time-based grants");
    Ok(granted)
}
