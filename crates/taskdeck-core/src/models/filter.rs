//! Task list filters

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::id::{ProjectId, TagId};
use super::task::{Task, TaskStatus};

/// Combined filter applied to the task list view.
///
/// All set criteria must hold; the tag criterion matches when the task has
/// any of the listed tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default = "show_completed_default")]
    pub show_completed: bool,
    #[serde(default)]
    pub show_important_only: bool,
    #[serde(default)]
    pub show_overdue_only: bool,
    #[serde(default)]
    pub search_query: String,
}

const fn show_completed_default() -> bool {
    true
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            project_id: None,
            tags: Vec::new(),
            status: None,
            show_completed: true,
            show_important_only: false,
            show_overdue_only: false,
            search_query: String::new(),
        }
    }
}

impl TaskFilter {
    #[must_use]
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        if self
            .project_id
            .as_ref()
            .is_some_and(|project| task.project_id.as_ref() != Some(project))
        {
            return false;
        }
        if !self.show_completed && task.completed {
            return false;
        }
        if self.show_important_only && !task.important {
            return false;
        }
        if self.show_overdue_only && !task.is_overdue(today) {
            return false;
        }
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| task.tags.contains(tag)) {
            return false;
        }

        let query = self.search_query.trim().to_lowercase();
        query.is_empty()
            || task.title.to_lowercase().contains(&query)
            || task
                .description
                .as_ref()
                .is_some_and(|description| description.to_lowercase().contains(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;

    fn task(title: &str) -> Task {
        NewTask::titled(title).into_task("u1", 0)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn default_filter_matches_everything() {
        let mut done = task("Done thing");
        done.completed = true;
        assert!(TaskFilter::default().matches(&task("a"), today()));
        assert!(TaskFilter::default().matches(&done, today()));
    }

    #[test]
    fn search_covers_title_and_description() {
        let mut with_description = task("Groceries");
        with_description.description = Some("Buy MILK and eggs".to_string());
        let filter = TaskFilter {
            search_query: "milk".to_string(),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&with_description, today()));
        assert!(!filter.matches(&task("Laundry"), today()));
    }

    #[test]
    fn tag_filter_matches_any_listed_tag() {
        let mut tagged = task("Tagged");
        tagged.tags = vec![TagId::from("home")];
        let filter = TaskFilter {
            tags: vec![TagId::from("work"), TagId::from("home")],
            ..TaskFilter::default()
        };
        assert!(filter.matches(&tagged, today()));
        assert!(!filter.matches(&task("Untagged"), today()));
    }

    #[test]
    fn hide_completed_and_overdue_only() {
        let mut late = task("Late");
        late.due_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        let mut finished = late.clone();
        finished.completed = true;

        let filter = TaskFilter {
            show_completed: false,
            show_overdue_only: true,
            ..TaskFilter::default()
        };
        assert!(filter.matches(&late, today()));
        assert!(!filter.matches(&finished, today()));
        assert!(!filter.matches(&task("No date"), today()));
    }
}
