use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::Subcommand;

use taskmate_client::{AuthFlow, TaskCollection};
use taskmate_core::{
    Priority, SortOrder, StatusFilter, Task, TaskForm, TaskPatch, TaskStatus, ViewQuery,
    parse_due_date, split_labels,
};

use crate::auth::require_login;

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// List tasks, optionally filtered, searched and sorted by priority
    List {
        /// all, pending, in-progress or completed
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// none, low-to-high or high-to-low
        #[arg(long, default_value = "none")]
        sort: SortOrder,

        /// Case-insensitive match on the title
        #[arg(long)]
        search: Option<String>,
    },

    /// Show every field of one task
    Show { id: String },

    /// Create a task
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long, default_value = "pending")]
        status: TaskStatus,

        #[arg(long, default_value = "medium")]
        priority: Priority,

        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,

        /// Comma separated, e.g. "home, errand"
        #[arg(long)]
        labels: Option<String>,
    },

    /// Change fields of an existing task
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        priority: Option<Priority>,

        /// YYYY-MM-DD, or "" to clear
        #[arg(long)]
        due: Option<String>,

        /// Comma separated; replaces the existing labels
        #[arg(long)]
        labels: Option<String>,
    },

    /// Delete a task
    Delete { id: String },
}

impl TasksCommand {
    /// Re-runnable command line, remembered when login is required first.
    fn destination(&self) -> String {
        match self {
            TasksCommand::List { .. } => "tasks list".to_string(),
            TasksCommand::Show { id } => format!("tasks show {id}"),
            TasksCommand::Add { .. } => "tasks add".to_string(),
            TasksCommand::Edit { id, .. } => format!("tasks edit {id}"),
            TasksCommand::Delete { id } => format!("tasks delete {id}"),
        }
    }
}

pub async fn run(cmd: TasksCommand, flow: &mut AuthFlow, tasks: &TaskCollection) -> Result<()> {
    require_login(flow, &cmd.destination()).await?;

    match cmd {
        TasksCommand::List {
            status,
            sort,
            search,
        } => {
            tasks.set_query(
                ViewQuery::new()
                    .with_status(status)
                    .with_sort(sort)
                    .with_search(search.unwrap_or_default()),
            );
            tasks.load().await.context("Error fetching tasks")?;
            list(tasks)
        }
        TasksCommand::Show { id } => {
            tasks.load().await.context("Error fetching tasks")?;
            let task = tasks
                .get(&id)
                .with_context(|| format!("no task with id {id}"))?;
            show(&task);
            Ok(())
        }
        TasksCommand::Add {
            title,
            description,
            status,
            priority,
            due,
            labels,
        } => {
            let mut form = TaskForm {
                title,
                description,
                status,
                priority,
                due_date: due.unwrap_or_default(),
                labels: labels.unwrap_or_default(),
            };
            let task = tasks.create(&mut form).await.context("Failed to save task")?;
            println!("Task created successfully! ({})", task.id);
            Ok(())
        }
        TasksCommand::Edit {
            id,
            title,
            description,
            status,
            priority,
            due,
            labels,
        } => {
            let patch = TaskPatch {
                title,
                description,
                status,
                priority,
                due_date: due.as_deref().map(parse_due_date).transpose()?,
                labels: labels.as_deref().map(split_labels),
            };
            if patch.is_empty() {
                bail!("nothing to change; pass at least one of --title, --description, --status, --priority, --due, --labels");
            }
            tasks.load().await.context("Error fetching tasks")?;
            let task = tasks
                .update(&id, &patch)
                .await
                .context("Error updating task")?;
            show(&task);
            Ok(())
        }
        TasksCommand::Delete { id } => {
            tasks.delete(&id).await.context("Error deleting task")?;
            println!("Deleted {id}");
            Ok(())
        }
    }
}

fn list(tasks: &TaskCollection) -> Result<()> {
    let visible = tasks.visible();
    let query = tasks.query();
    if visible.is_empty() {
        println!("No tasks available for the selected filter.");
        return Ok(());
    }

    let today = Local::now().date_naive();
    println!(
        "{:<26} {:<12} {:<8} {:<11} TITLE",
        "ID", "STATUS", "PRIORITY", "DUE"
    );
    for t in &visible {
        println!(
            "{:<26} {:<12} {:<8} {:<11} {}{}",
            t.id,
            t.status.as_str(),
            t.priority.as_str(),
            due_cell(t, today),
            t.title,
            if t.labels.is_empty() {
                String::new()
            } else {
                format!("  [{}]", t.labels.join(", "))
            }
        );
    }
    println!(
        "\n{} of {} tasks (status={}, sort={})",
        visible.len(),
        tasks.all().len(),
        query.status,
        query.sort
    );
    Ok(())
}

fn due_cell(task: &Task, today: NaiveDate) -> String {
    match task.due_date {
        Some(d) if d < today && task.status != TaskStatus::Completed => {
            format!("{}!", d.format("%Y-%m-%d"))
        }
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => "-".to_string(),
    }
}

fn show(task: &Task) {
    println!("{} [{}]", task.title, task.status);
    println!("  id:          {}", task.id);
    println!("  priority:    {}", task.priority);
    match task.due_date {
        Some(d) => println!("  due:         {}", d.format("%d/%m/%Y")),
        None => println!("  due:         -"),
    }
    println!("  description: {}", task.description);
    println!("  labels:      {}", task.labels.join(", "));
}
