//! Read-only views over the task collection

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{ProjectId, TagId, Task, TaskFilter, TaskStatus};

use super::EntityStore;

impl EntityStore {
    #[must_use]
    pub fn tasks_by_date(&self, date: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.due_date == Some(date))
            .collect()
    }

    /// Tasks in `project`, or tasks without a project when `None`.
    #[must_use]
    pub fn tasks_by_project(&self, project: Option<&ProjectId>) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.project_id.as_ref() == project)
            .collect()
    }

    #[must_use]
    pub fn tasks_by_tag(&self, tag: &TagId) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.references_tag(tag))
            .collect()
    }

    /// Tasks in one kanban column, in display order.
    #[must_use]
    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| task.status == status)
            .collect();
        tasks.sort_by_key(|task| task.order);
        tasks
    }

    #[must_use]
    pub fn important_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.important && !task.completed)
            .collect()
    }

    #[must_use]
    pub fn overdue_tasks(&self, today: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.is_overdue(today))
            .collect()
    }

    /// Open tasks falling due between `now` and `now + window`.
    #[must_use]
    pub fn due_within(&self, now: DateTime<Utc>, window: Duration) -> Vec<&Task> {
        let until = now + window;
        self.tasks
            .iter()
            .filter(|task| !task.completed)
            .filter(|task| task.due_at().is_some_and(|due| due >= now && due <= until))
            .collect()
    }

    #[must_use]
    pub fn filtered(&self, filter: &TaskFilter, today: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| filter.matches(task, today))
            .collect()
    }

    /// Every status column, in board order, each sorted by display order.
    #[must_use]
    pub fn kanban(&self) -> Vec<(TaskStatus, Vec<&Task>)> {
        TaskStatus::ALL
            .into_iter()
            .map(|status| (status, self.tasks_by_status(status)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, TaskPatch};
    use chrono::{NaiveTime, TimeZone};
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn titles(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|task| task.title.clone()).collect()
    }

    fn seeded() -> EntityStore {
        let mut store = EntityStore::new("u1");
        store.add_task(NewTask {
            due_date: Some(date(3)),
            important: true,
            ..NewTask::titled("Pay rent")
        });
        store.add_task(NewTask {
            due_date: Some(date(10)),
            due_time: NaiveTime::from_hms_opt(9, 30, 0),
            status: TaskStatus::InProgress,
            ..NewTask::titled("Dentist")
        });
        store.add_task(NewTask {
            due_date: Some(date(3)),
            completed: true,
            important: true,
            status: TaskStatus::Done,
            ..NewTask::titled("Old chore")
        });
        store.add_task(NewTask::titled("Someday"));
        store
    }

    #[test]
    fn overdue_excludes_completed_and_today() {
        let store = seeded();
        assert_eq!(titles(&store.overdue_tasks(date(4))), vec!["Pay rent"]);
        assert!(store.overdue_tasks(date(3)).is_empty());
    }

    #[test]
    fn important_excludes_completed() {
        let store = seeded();
        assert_eq!(titles(&store.important_tasks()), vec!["Pay rent"]);
    }

    #[test]
    fn by_date_and_project() {
        let store = seeded();
        assert_eq!(
            titles(&store.tasks_by_date(date(3))),
            vec!["Pay rent", "Old chore"]
        );
        assert_eq!(store.tasks_by_project(None).len(), 4);
    }

    #[test]
    fn due_within_uses_due_time() {
        let store = seeded();
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        assert_eq!(
            titles(&store.due_within(now, Duration::minutes(30))),
            vec!["Dentist"]
        );
        assert!(store.due_within(now, Duration::minutes(10)).is_empty());
    }

    #[test]
    fn kanban_columns_follow_board_and_display_order() {
        let mut store = seeded();
        let later = store.add_task(NewTask::titled("Later"));
        store.update_task(
            &later.id,
            TaskPatch {
                order: Some(-1),
                ..TaskPatch::default()
            },
        );

        let board = store.kanban();
        let columns: Vec<TaskStatus> = board.iter().map(|(status, _)| *status).collect();
        assert_eq!(columns, TaskStatus::ALL.to_vec());
        assert_eq!(titles(&board[1].1), vec!["Later", "Pay rent", "Someday"]);
        assert_eq!(titles(&board[3].1), vec!["Old chore"]);
    }
}
