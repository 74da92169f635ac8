//! Activity catalog and roster mutation.
//!
//! The set of activities is fixed at construction; only rosters change. Each
//! roster has its own lock so the duplicate and capacity checks and the
//! insertion they guard happen as one step.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::auth::Caller;
use crate::err::Error;
use crate::models::{Activity, Role};
use crate::service::Service;
use crate::{proceeds, Message, Payload};

#[derive(Debug)]
pub struct Registry {
    activities: BTreeMap<String, Mutex<Activity>>,
}

impl Registry {
    pub fn new<I>(activities: I) -> Self
    where
        I: IntoIterator<Item = (String, Activity)>,
    {
        Self {
            activities: activities
                .into_iter()
                .map(|(name, activity)| (name, Mutex::new(activity)))
                .collect(),
        }
    }

    /// The Mergington High School catalog served at startup.
    pub fn seeded() -> Self {
        Self::new(
            [
                ("Chess Club", "Learn strategies and compete in chess tournaments", "Fridays, 3:30 PM - 5:00 PM", 12, ["michael@mergington.edu", "daniel@mergington.edu"]),
                ("Programming Class", "Learn programming fundamentals and build software projects", "Tuesdays and Thursdays, 3:30 PM - 4:30 PM", 20, ["emma@mergington.edu", "sophia@mergington.edu"]),
                ("Gym Class", "Physical education and sports activities", "Mondays, Wednesdays, Fridays, 2:00 PM - 3:00 PM", 30, ["john@mergington.edu", "olivia@mergington.edu"]),
                ("Soccer Team", "Join the school soccer team and compete in matches", "Tuesdays and Thursdays, 4:00 PM - 5:30 PM", 22, ["liam@mergington.edu", "noah@mergington.edu"]),
                ("Basketball Team", "Practice and play basketball with the school team", "Wednesdays and Fridays, 3:30 PM - 5:00 PM", 15, ["ava@mergington.edu", "mia@mergington.edu"]),
                ("Art Club", "Explore your creativity through painting and drawing", "Thursdays, 3:30 PM - 5:00 PM", 15, ["amelia@mergington.edu", "harper@mergington.edu"]),
                ("Drama Club", "Act, direct, and produce plays and performances", "Mondays and Wednesdays, 4:00 PM - 5:30 PM", 20, ["ella@mergington.edu", "scarlett@mergington.edu"]),
                ("Math Club", "Solve challenging problems and participate in math competitions", "Tuesdays, 3:30 PM - 4:30 PM", 10, ["james@mergington.edu", "benjamin@mergington.edu"]),
                ("Debate Team", "Develop public speaking and argumentation skills", "Fridays, 4:00 PM - 5:30 PM", 12, ["charlotte@mergington.edu", "henry@mergington.edu"]),
            ]
            .into_iter()
            .map(|(name, description, schedule, max_participants, participants)| {
                (
                    name.to_string(),
                    Activity {
                        description: description.to_string(),
                        schedule: schedule.to_string(),
                        max_participants,
                        participants: participants.iter().map(|p| p.to_string()).collect(),
                    },
                )
            }),
        )
    }

    pub fn list(&self) -> BTreeMap<String, Activity> {
        self.activities
            .iter()
            .map(|(name, activity)| (name.clone(), activity.lock().clone()))
            .collect()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<Activity> {
        self.activities.get(name).map(|activity| activity.lock().clone())
    }

    pub fn register(&self, name: &str, email: &str) -> Result<(), Error> {
        let mut activity = self.roster(name)?.lock();
        if activity.participants.iter().any(|p| p == email) {
            return Err(Error::conflict("Student already registered for this activity"));
        }
        if activity.participants.len() >= activity.max_participants {
            return Err(Error::full("Activity is full"));
        }
        activity.participants.push(email.to_string());
        Ok(())
    }

    pub fn unregister(&self, name: &str, email: &str) -> Result<(), Error> {
        let mut activity = self.roster(name)?.lock();
        let Some(position) = activity.participants.iter().position(|p| p == email) else {
            return Err(Error::conflict("Student not registered for this activity"));
        };
        activity.participants.remove(position);
        Ok(())
    }

    fn roster(&self, name: &str) -> Result<&Mutex<Activity>, Error> {
        self.activities
            .get(name)
            .ok_or_else(|| Error::not_found("Activity not found"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentQuery {
    student_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailQuery {
    email: String,
}

/// The bare name-to-activity mapping, without the success envelope.
pub async fn list_activities(
    State(service): State<Arc<Service>>,
) -> Json<BTreeMap<String, Activity>> {
    Json(service.registry.list())
}

pub async fn register_student(
    State(service): State<Arc<Service>>,
    caller: Caller,
    Path(activity): Path<String>,
    query: Result<Query<StudentQuery>, QueryRejection>,
) -> Payload<Message> {
    let teacher = caller.require(
        Role::Teacher,
        "Only teachers can register students for activities",
    )?;
    let Query(StudentQuery { student_email }) = query?;
    enroll(&service, &teacher.username, &activity, &student_email)?;
    proceeds(Message::new(format!(
        "Student {} registered for {}",
        student_email, activity
    )))
}

pub async fn unregister_student(
    State(service): State<Arc<Service>>,
    caller: Caller,
    Path(activity): Path<String>,
    query: Result<Query<StudentQuery>, QueryRejection>,
) -> Payload<Message> {
    let teacher = caller.require(
        Role::Teacher,
        "Only teachers can unregister students from activities",
    )?;
    let Query(StudentQuery { student_email }) = query?;
    withdraw(&service, &teacher.username, &activity, &student_email)?;
    proceeds(Message::new(format!(
        "Student {} unregistered from {}",
        student_email, activity
    )))
}

/// `POST /activities/{name}/signup?email=`, kept for older clients.
pub async fn signup_for_activity(
    State(service): State<Arc<Service>>,
    caller: Caller,
    Path(activity): Path<String>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Payload<Message> {
    let teacher = caller.require(Role::Teacher, "Authentication required")?;
    let Query(EmailQuery { email }) = query?;
    enroll(&service, &teacher.username, &activity, &email).map_err(|err| match err {
        Error::Conflict { .. } => Error::conflict("Student is already signed up"),
        other => other,
    })?;
    proceeds(Message::new(format!("Signed up {} for {}", email, activity)))
}

/// `DELETE /activities/{name}/unregister?email=`, kept for older clients.
pub async fn remove_from_activity(
    State(service): State<Arc<Service>>,
    caller: Caller,
    Path(activity): Path<String>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Payload<Message> {
    let teacher = caller.require(
        Role::Teacher,
        "Only teachers can unregister students from activities",
    )?;
    let Query(EmailQuery { email }) = query?;
    withdraw(&service, &teacher.username, &activity, &email)?;
    proceeds(Message::new(format!("Unregistered {} from {}", email, activity)))
}

fn enroll(service: &Service, teacher: &str, activity: &str, email: &str) -> Result<(), Error> {
    match service.registry.register(activity, email) {
        Ok(()) => {
            log::info!("{} registered {} for {}", teacher, email, activity);
            Ok(())
        }
        Err(err) => {
            log::debug!("{} could not register {} for {}: {}", teacher, email, activity, err);
            Err(err)
        }
    }
}

fn withdraw(service: &Service, teacher: &str, activity: &str, email: &str) -> Result<(), Error> {
    match service.registry.unregister(activity, email) {
        Ok(()) => {
            log::info!("{} unregistered {} from {}", teacher, email, activity);
            Ok(())
        }
        Err(err) => {
            log::debug!("{} could not unregister {} from {}: {}", teacher, email, activity, err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_club(max: usize, participants: &[&str]) -> Registry {
        Registry::new([(
            "Chess Club".to_string(),
            Activity {
                description: "Chess".to_string(),
                schedule: "Fridays".to_string(),
                max_participants: max,
                participants: participants.iter().map(|p| p.to_string()).collect(),
            },
        )])
    }

    #[test]
    fn seeded_catalog_has_nine_activities() {
        let registry = Registry::seeded();
        let catalog = registry.list();
        assert_eq!(catalog.len(), 9);
        let chess = &catalog["Chess Club"];
        assert_eq!(chess.max_participants, 12);
        assert_eq!(
            chess.participants,
            vec!["michael@mergington.edu", "daniel@mergington.edu"]
        );
        assert!(catalog
            .values()
            .all(|a| a.participants.len() <= a.max_participants));
    }

    #[test]
    fn register_appends_participant() {
        let registry = small_club(3, &["a@mergington.edu"]);
        registry.register("Chess Club", "b@mergington.edu").unwrap();
        assert_eq!(
            registry.get("Chess Club").unwrap().participants,
            vec!["a@mergington.edu", "b@mergington.edu"]
        );
    }

    #[test]
    fn register_unknown_activity_is_not_found() {
        let registry = small_club(3, &[]);
        let err = registry.register("Knitting", "a@mergington.edu").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn register_duplicate_is_conflict_even_when_full() {
        let registry = small_club(1, &["a@mergington.edu"]);
        let err = registry.register("Chess Club", "a@mergington.edu").unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn register_fills_to_capacity_then_rejects() {
        let registry = small_club(2, &["a@mergington.edu"]);
        registry.register("Chess Club", "b@mergington.edu").unwrap();
        assert_eq!(registry.get("Chess Club").unwrap().participants.len(), 2);

        let err = registry.register("Chess Club", "c@mergington.edu").unwrap_err();
        assert_eq!(err, Error::full("Activity is full"));
        assert_eq!(registry.get("Chess Club").unwrap().participants.len(), 2);
    }

    #[test]
    fn unregister_removes_exactly_one() {
        let registry = small_club(3, &["a@mergington.edu", "b@mergington.edu"]);
        registry.unregister("Chess Club", "a@mergington.edu").unwrap();
        assert_eq!(
            registry.get("Chess Club").unwrap().participants,
            vec!["b@mergington.edu"]
        );
    }

    #[test]
    fn unregister_absent_student_is_conflict() {
        let registry = small_club(3, &["a@mergington.edu"]);
        let err = registry.unregister("Chess Club", "z@mergington.edu").unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let err = registry.unregister("Knitting", "a@mergington.edu").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn concurrent_registrations_respect_capacity() {
        let registry = std::sync::Arc::new(small_club(5, &[]));
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .register("Chess Club", &format!("s{}@mergington.edu", i))
                        .is_ok()
                })
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 5);
        assert_eq!(registry.get("Chess Club").unwrap().participants.len(), 5);
    }
}
