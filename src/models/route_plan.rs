//! Construcción de rutas
//!
//! `RoutePlan` agrupa una ruta con sus buses y conductores AM/PM, los
//! estudiantes asignados y sus paradas. Calcula capacidad, utilización y
//! eficiencia, aplica las reglas de alta/baja de estudiantes y valida si la
//! ruta puede activarse.
//!
//! Cada mutación publica un [`RouteChange`] en un canal broadcast; quien
//! necesite reaccionar (una vista, un caché) se suscribe con
//! [`RoutePlan::subscribe`].

use std::fmt;

use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::bus::Bus;
use super::driver::Driver;
use super::route::{Route, RouteTimeSlot};
use super::route_stop::RouteStop;
use super::student::Student;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Valores derivados que cambian tras una mutación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteField {
    AssignedStudents,
    UtilizationRate,
    AvailableCapacity,
    IsAtCapacity,
    DisplayName,
    RouteStops,
    EstimatedTotalTime,
}

const ASSIGNMENT_FIELDS: [RouteField; 5] = [
    RouteField::AssignedStudents,
    RouteField::UtilizationRate,
    RouteField::AvailableCapacity,
    RouteField::IsAtCapacity,
    RouteField::DisplayName,
];

const STOP_FIELDS: [RouteField; 2] = [RouteField::RouteStops, RouteField::EstimatedTotalTime];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RouteChangeKind {
    StudentAdded { student_id: Uuid, slot: RouteTimeSlot },
    StudentRemoved { student_id: Uuid },
    StopAdded { stop_id: Uuid },
    StopsReordered,
}

/// Evento publicado tras cada mutación de la ruta
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteChange {
    pub route_id: Uuid,
    pub kind: RouteChangeKind,
    pub changed: Vec<RouteField>,
}

/// Problema que impide (o no) activar una ruta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationIssue {
    MissingAssignment,
    NoStudents,
    OverCapacity { assigned: usize, capacity: i32 },
    NoStops,
}

impl fmt::Display for ActivationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationIssue::MissingAssignment => {
                write!(f, "Route must have at least one vehicle and driver assignment")
            }
            ActivationIssue::NoStudents => write!(f, "Route must have at least one assigned student"),
            ActivationIssue::OverCapacity { assigned, capacity } => {
                write!(f, "Route exceeds capacity: {}/{} students", assigned, capacity)
            }
            ActivationIssue::NoStops => write!(f, "Route must have at least one stop"),
        }
    }
}

impl Serialize for ActivationIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Resultado de la validación previa a la activación
#[derive(Debug, Clone, Serialize)]
pub struct RouteValidationResult {
    pub is_valid: bool,
    /// Una ruta cuyo único problema es no tener paradas puede activarse
    /// igualmente (política temporal de despliegue).
    pub can_activate: bool,
    pub issues: Vec<ActivationIssue>,
    pub summary: String,
}

impl RouteValidationResult {
    pub fn from_issues(issues: Vec<ActivationIssue>) -> Self {
        let is_valid = issues.is_empty();
        let can_activate = issues.iter().all(|i| *i == ActivationIssue::NoStops);
        let summary = if is_valid {
            "✅ Route is valid".to_string()
        } else {
            format!("❌ {} issue(s) found", issues.len())
        };

        Self {
            is_valid,
            can_activate,
            issues,
            summary,
        }
    }

    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub route: Route,
    pub am_bus: Option<Bus>,
    pub pm_bus: Option<Bus>,
    pub am_driver: Option<Driver>,
    pub pm_driver: Option<Driver>,
    assigned_students: Vec<Student>,
    stops: Vec<RouteStop>,
    changes: broadcast::Sender<RouteChange>,
}

impl RoutePlan {
    pub fn new(route: Route) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            route,
            am_bus: None,
            pm_bus: None,
            am_driver: None,
            pm_driver: None,
            assigned_students: Vec::new(),
            stops: Vec::new(),
            changes,
        }
    }

    pub fn with_am(mut self, bus: Option<Bus>, driver: Option<Driver>) -> Self {
        self.am_bus = bus;
        self.am_driver = driver;
        self
    }

    pub fn with_pm(mut self, bus: Option<Bus>, driver: Option<Driver>) -> Self {
        self.pm_bus = bus;
        self.pm_driver = driver;
        self
    }

    /// Carga los estudiantes ya asignados tal como están persistidos, sin
    /// aplicar la regla de capacidad (la validación lo detecta después).
    pub fn with_students(mut self, students: Vec<Student>) -> Self {
        self.assigned_students = students;
        self
    }

    pub fn with_stops(mut self, mut stops: Vec<RouteStop>) -> Self {
        stops.sort_by_key(|s| s.stop_order);
        self.stops = stops;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteChange> {
        self.changes.subscribe()
    }

    pub fn assigned_students(&self) -> &[Student] {
        &self.assigned_students
    }

    pub fn stops(&self) -> &[RouteStop] {
        &self.stops
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned_students.len()
    }

    /// Mayor capacidad entre el bus AM y el PM (0 sin buses)
    pub fn max_capacity(&self) -> i32 {
        let am = self.am_bus.as_ref().map(|b| b.seating_capacity).unwrap_or(0);
        let pm = self.pm_bus.as_ref().map(|b| b.seating_capacity).unwrap_or(0);
        am.max(pm)
    }

    pub fn available_capacity(&self) -> usize {
        (i64::from(self.max_capacity()) - self.assigned_count() as i64).max(0) as usize
    }

    pub fn is_at_capacity(&self) -> bool {
        self.assigned_count() as i64 >= i64::from(self.max_capacity())
    }

    /// Utilización 0.0..1.0 (puede superar 1.0 si hay sobrecupo)
    pub fn utilization_rate(&self) -> f64 {
        let capacity = self.max_capacity();
        if capacity > 0 {
            self.assigned_count() as f64 / f64::from(capacity)
        } else {
            0.0
        }
    }

    /// Puntuación heurística 0.0..1.0: 40% utilización, 30% distancia por
    /// estudiante, 30% duración. Sin validación de dominio todavía.
    pub fn efficiency_score(&self) -> f64 {
        let count = self.assigned_count();
        if count == 0 {
            return 0.0;
        }

        let utilization_score = self.utilization_rate() * 0.4;

        let distance = self
            .route
            .distance
            .and_then(|d| d.to_f64())
            .unwrap_or(0.0);
        let distance_score = if distance > 0.0 {
            (10.0 / distance * count as f64).min(1.0) * 0.3
        } else {
            0.0
        };

        let duration = self.route.estimated_duration_minutes.unwrap_or(0);
        let time_score = if duration > 0 {
            (60.0 / f64::from(duration)).min(1.0) * 0.3
        } else {
            0.0
        };

        (utilization_score + distance_score + time_score).clamp(0.0, 1.0)
    }

    pub fn display_name(&self) -> String {
        format!(
            "{} ({}/{} students)",
            self.route.route_name,
            self.assigned_count(),
            self.max_capacity()
        )
    }

    pub fn status_indicator(&self) -> &'static str {
        self.route.building_status.indicator()
    }

    /// Tiempo entre la primera y la última parada
    pub fn estimated_total_time(&self) -> Duration {
        match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => last.scheduled_time.signed_duration_since(first.scheduled_time),
            _ => Duration::zero(),
        }
    }

    pub fn has_am_assignment(&self) -> bool {
        self.am_bus.is_some() && self.am_driver.is_some()
    }

    pub fn has_pm_assignment(&self) -> bool {
        self.pm_bus.is_some() && self.pm_driver.is_some()
    }

    pub fn contains_student(&self, student_id: Uuid) -> bool {
        self.assigned_students.iter().any(|s| s.id == student_id)
    }

    /// ¿Aceptaría la ruta a este estudiante?
    pub fn can_accept(&self, student_id: Uuid) -> bool {
        !self.is_at_capacity() && !self.contains_student(student_id)
    }

    /// Asigna el estudiante al turno indicado. Devuelve `false` sin modificar
    /// nada si la ruta está llena o el estudiante ya estaba asignado.
    pub fn try_add_student(&mut self, student: &mut Student, slot: RouteTimeSlot) -> bool {
        if !self.can_accept(student.id) {
            return false;
        }

        if slot.includes_am() {
            student.am_route = Some(self.route.route_name.clone());
        }
        if slot.includes_pm() {
            student.pm_route = Some(self.route.route_name.clone());
        }
        self.assigned_students.push(student.clone());

        self.notify(
            RouteChangeKind::StudentAdded {
                student_id: student.id,
                slot,
            },
            &ASSIGNMENT_FIELDS,
        );
        true
    }

    /// Quita al estudiante y limpia los turnos que apuntaban a esta ruta.
    /// Devuelve `false` si no estaba asignado.
    pub fn try_remove_student(&mut self, student: &mut Student) -> bool {
        let Some(position) = self.assigned_students.iter().position(|s| s.id == student.id) else {
            return false;
        };
        self.assigned_students.remove(position);

        let route_name = self.route.route_name.as_str();
        if student.am_route.as_deref() == Some(route_name) {
            student.am_route = None;
        }
        if student.pm_route.as_deref() == Some(route_name) {
            student.pm_route = None;
        }

        self.notify(
            RouteChangeKind::StudentRemoved {
                student_id: student.id,
            },
            &ASSIGNMENT_FIELDS,
        );
        true
    }

    /// Añade la parada al final de la ruta
    pub fn add_route_stop(&mut self, mut stop: RouteStop) -> &RouteStop {
        stop.route_id = self.route.id;
        stop.stop_order = self.stops.len() as i32 + 1;
        let stop_id = stop.id;
        self.stops.push(stop);

        self.notify(RouteChangeKind::StopAdded { stop_id }, &STOP_FIELDS);
        &self.stops[self.stops.len() - 1]
    }

    /// Reordena las paradas por hora programada y renumera 1..N
    pub fn reorder_stops_by_time(&mut self) {
        self.stops.sort_by_key(|s| s.scheduled_time);
        for (index, stop) in self.stops.iter_mut().enumerate() {
            stop.stop_order = index as i32 + 1;
        }

        self.notify(RouteChangeKind::StopsReordered, &STOP_FIELDS);
    }

    pub fn validate_for_activation(&self) -> RouteValidationResult {
        let mut issues = Vec::new();

        if !self.has_am_assignment() && !self.has_pm_assignment() {
            issues.push(ActivationIssue::MissingAssignment);
        }

        if self.assigned_students.is_empty() {
            issues.push(ActivationIssue::NoStudents);
        }

        if self.assigned_count() as i64 > i64::from(self.max_capacity()) {
            issues.push(ActivationIssue::OverCapacity {
                assigned: self.assigned_count(),
                capacity: self.max_capacity(),
            });
        }

        if self.stops.is_empty() {
            issues.push(ActivationIssue::NoStops);
        }

        RouteValidationResult::from_issues(issues)
    }

    fn notify(&self, kind: RouteChangeKind, fields: &[RouteField]) {
        // Sin suscriptores el envío falla y no hay nada que hacer
        let _ = self.changes.send(RouteChange {
            route_id: self.route.id,
            kind,
            changed: fields.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    fn route(name: &str) -> Route {
        Route::new(name, NaiveDate::from_ymd_opt(2025, 9, 2).unwrap())
    }

    fn plan_with_capacity(name: &str, capacity: i32) -> RoutePlan {
        RoutePlan::new(route(name)).with_am(
            Some(Bus::new("Bus #17", capacity)),
            Some(Driver::new("Dana", "Lopez", "CO-1")),
        )
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_east_route_scenario() {
        let mut plan = plan_with_capacity("East", 2);
        let mut s1 = Student::new("S1");
        let mut s2 = Student::new("S2");
        let mut s3 = Student::new("S3");

        assert!(plan.try_add_student(&mut s1, RouteTimeSlot::Am));
        assert!(plan.try_add_student(&mut s2, RouteTimeSlot::Am));
        assert!(plan.is_at_capacity());

        assert!(!plan.try_add_student(&mut s3, RouteTimeSlot::Am));
        assert_eq!(plan.assigned_count(), 2);
        assert_eq!(s3.am_route, None);

        assert!(plan.try_remove_student(&mut s1));
        assert_eq!(plan.available_capacity(), 1);

        assert!(plan.try_add_student(&mut s3, RouteTimeSlot::Am));
        assert_eq!(s3.am_route.as_deref(), Some("East"));
        assert_eq!(plan.display_name(), "East (2/2 students)");
    }

    #[test]
    fn test_capacity_invariant_holds_for_each_count() {
        let mut plan = plan_with_capacity("North", 3);
        for n in 0..5 {
            let expected_available = (3 - n as i64).max(0) as usize;
            assert_eq!(plan.available_capacity(), expected_available);
            assert_eq!(plan.is_at_capacity(), n >= 3);
            let mut student = Student::new(format!("S{}", n));
            plan.try_add_student(&mut student, RouteTimeSlot::Pm);
        }
        assert_eq!(plan.assigned_count(), 3);
    }

    #[test]
    fn test_max_capacity_uses_larger_bus() {
        let plan = RoutePlan::new(route("West"))
            .with_am(Some(Bus::new("A", 14)), None)
            .with_pm(Some(Bus::new("B", 65)), None);
        assert_eq!(plan.max_capacity(), 65);

        let empty = RoutePlan::new(route("Empty"));
        assert_eq!(empty.max_capacity(), 0);
        assert_eq!(empty.utilization_rate(), 0.0);
        assert!(empty.is_at_capacity());
    }

    #[test]
    fn test_duplicate_assignment_rejected() {
        let mut plan = plan_with_capacity("East", 10);
        let mut student = Student::new("Ava");
        assert!(plan.try_add_student(&mut student, RouteTimeSlot::Am));
        assert!(!plan.try_add_student(&mut student, RouteTimeSlot::Pm));
        assert_eq!(plan.assigned_count(), 1);
        assert_eq!(student.pm_route, None);
    }

    #[test]
    fn test_add_remove_symmetry() {
        let mut plan = plan_with_capacity("East", 10);
        let mut student = Student::new("Ava");
        student.pm_route = Some("West".to_string());
        let before = student.clone();

        assert!(plan.try_add_student(&mut student, RouteTimeSlot::Am));
        assert!(plan.try_remove_student(&mut student));

        assert_eq!(plan.assigned_count(), 0);
        assert_eq!(student.am_route, before.am_route);
        assert_eq!(student.pm_route, before.pm_route);
    }

    #[test]
    fn test_both_slot_sets_and_clears_both_fields() {
        let mut plan = plan_with_capacity("South", 10);
        let mut student = Student::new("Ben");
        assert!(plan.try_add_student(&mut student, RouteTimeSlot::Both));
        assert_eq!(student.am_route.as_deref(), Some("South"));
        assert_eq!(student.pm_route.as_deref(), Some("South"));

        assert!(plan.try_remove_student(&mut student));
        assert_eq!(student.am_route, None);
        assert_eq!(student.pm_route, None);
    }

    #[test]
    fn test_remove_unknown_student_returns_false() {
        let mut plan = plan_with_capacity("East", 10);
        let mut student = Student::new("Ghost");
        student.am_route = Some("East".to_string());
        assert!(!plan.try_remove_student(&mut student));
        assert_eq!(student.am_route.as_deref(), Some("East"));
    }

    #[test]
    fn test_efficiency_score() {
        let mut plan = plan_with_capacity("East", 4);
        assert_eq!(plan.efficiency_score(), 0.0);

        plan.route.distance = Some(Decimal::from(20));
        plan.route.estimated_duration_minutes = Some(120);
        let mut a = Student::new("A");
        let mut b = Student::new("B");
        plan.try_add_student(&mut a, RouteTimeSlot::Am);
        plan.try_add_student(&mut b, RouteTimeSlot::Am);

        // 0.5*0.4 + min(1, 10/20*2)*0.3 + min(1, 60/120)*0.3
        let expected = 0.2 + 0.3 + 0.15;
        assert!((plan.efficiency_score() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_score_ignores_zero_distance_and_duration() {
        let mut plan = plan_with_capacity("East", 2);
        plan.route.distance = Some(Decimal::ZERO);
        plan.route.estimated_duration_minutes = Some(0);
        let mut a = Student::new("A");
        plan.try_add_student(&mut a, RouteTimeSlot::Am);
        assert!((plan.efficiency_score() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_activation_requires_students() {
        let plan = plan_with_capacity("East", 2);
        let result = plan.validate_for_activation();
        assert!(!result.is_valid);
        assert!(!result.can_activate);
        assert!(result
            .issue_messages()
            .contains(&"Route must have at least one assigned student".to_string()));
    }

    #[test]
    fn test_activation_allowed_without_stops() {
        let mut plan = plan_with_capacity("East", 2);
        let mut student = Student::new("Ava");
        plan.try_add_student(&mut student, RouteTimeSlot::Am);

        let result = plan.validate_for_activation();
        assert!(!result.is_valid);
        assert!(result.can_activate);
        assert_eq!(result.issues, vec![ActivationIssue::NoStops]);
        assert_eq!(result.summary, "❌ 1 issue(s) found");
    }

    #[test]
    fn test_activation_flags_over_capacity_and_missing_assignment() {
        let students = vec![Student::new("A"), Student::new("B"), Student::new("C")];
        let plan = RoutePlan::new(route("East"))
            .with_am(Some(Bus::new("Bus #2", 2)), None)
            .with_students(students);

        let result = plan.validate_for_activation();
        assert_eq!(
            result.issue_messages(),
            vec![
                "Route must have at least one vehicle and driver assignment".to_string(),
                "Route exceeds capacity: 3/2 students".to_string(),
                "Route must have at least one stop".to_string(),
            ]
        );
        assert!(!result.can_activate);
    }

    #[test]
    fn test_fully_valid_route() {
        let mut plan = plan_with_capacity("East", 2);
        let mut student = Student::new("Ava");
        plan.try_add_student(&mut student, RouteTimeSlot::Am);
        plan.add_route_stop(RouteStop::new(Uuid::nil(), "Main St", time(7, 5)));

        let result = plan.validate_for_activation();
        assert!(result.is_valid && result.can_activate);
        assert_eq!(result.summary, "✅ Route is valid");
    }

    #[test]
    fn test_stops_append_and_reorder_by_time() {
        let mut plan = plan_with_capacity("East", 2);
        let route_id = plan.route.id;
        let first = plan.add_route_stop(RouteStop::new(Uuid::nil(), "Late", time(7, 40))).clone();
        assert_eq!(first.stop_order, 1);
        assert_eq!(first.route_id, route_id);
        plan.add_route_stop(RouteStop::new(Uuid::nil(), "Early", time(7, 0)));

        plan.reorder_stops_by_time();
        let names: Vec<&str> = plan.stops().iter().map(|s| s.stop_name.as_str()).collect();
        assert_eq!(names, vec!["Early", "Late"]);
        assert_eq!(plan.stops()[1].stop_order, 2);
        assert_eq!(plan.estimated_total_time(), Duration::minutes(40));
    }

    #[tokio::test]
    async fn test_subscribers_receive_assignment_changes() {
        let mut plan = plan_with_capacity("East", 2);
        let mut rx = plan.subscribe();
        let mut student = Student::new("Ava");

        plan.try_add_student(&mut student, RouteTimeSlot::Pm);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.route_id, plan.route.id);
        assert_eq!(
            change.kind,
            RouteChangeKind::StudentAdded {
                student_id: student.id,
                slot: RouteTimeSlot::Pm
            }
        );
        assert!(change.changed.contains(&RouteField::IsAtCapacity));

        plan.try_remove_student(&mut student);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.kind, RouteChangeKind::StudentRemoved { student_id: student.id });
    }

    #[test]
    fn test_rejected_add_publishes_nothing() {
        let mut plan = plan_with_capacity("East", 0);
        let mut rx = plan.subscribe();
        let mut student = Student::new("Ava");
        assert!(!plan.try_add_student(&mut student, RouteTimeSlot::Am));
        assert!(rx.try_recv().is_err());
    }
}
