use std::collections::HashMap;

use chrono::Duration;

use crate::tracker::entities::{Category, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub category: Category,
    pub sessions: Vec<Session>,
    pub total_duration: Duration,
}

impl CategoryGroup {
    fn new(category: Category) -> Self {
        Self {
            category,
            sessions: vec![],
            total_duration: Duration::zero(),
        }
    }
}

/// Sessions partitioned by category. Groups keep the order in which their category was first
/// seen, sessions keep their input order inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupedAggregate {
    groups: Vec<CategoryGroup>,
}

impl GroupedAggregate {
    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn get(&self, category: &Category) -> Option<&CategoryGroup> {
        self.groups.iter().find(|v| &v.category == category)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.groups
            .iter()
            .fold(Duration::zero(), |acc, v| acc + v.total_duration)
    }

    pub fn session_count(&self) -> usize {
        self.groups.iter().map(|v| v.sessions.len()).sum()
    }
}

/// Groups sessions per category in a single pass.
pub fn group<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> GroupedAggregate {
    let mut positions = HashMap::<Category, usize>::new();
    let mut groups = Vec::<CategoryGroup>::new();

    for session in sessions {
        let position = *positions
            .entry(session.category.clone())
            .or_insert_with(|| {
                groups.push(CategoryGroup::new(session.category.clone()));
                groups.len() - 1
            });
        let group = &mut groups[position];
        group.total_duration += session.duration;
        group.sessions.push(session.clone());
    }

    GroupedAggregate { groups }
}
