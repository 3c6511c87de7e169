//! Modelo de RouteStop
//!
//! Parada de una ruta. `stop_order` es siempre contiguo 1..N dentro de la ruta.

use std::collections::{HashMap, HashSet};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub stop_name: String,
    pub address: Option<String>,
    pub stop_order: i32,
    pub scheduled_time: NaiveTime,
}

impl RouteStop {
    pub fn new(route_id: Uuid, stop_name: impl Into<String>, scheduled_time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_id,
            stop_name: stop_name.into(),
            address: None,
            stop_order: 0,
            scheduled_time,
        }
    }
}

/// Calcula el nuevo `stop_order` de cada parada a partir de la secuencia de ids.
///
/// La secuencia debe ser una permutación exacta de las paradas de la ruta:
/// cualquier id desconocido, repetido o ausente hace fallar la operación
/// completa sin producir cambios.
pub fn plan_stop_order(current: &[RouteStop], ordered_ids: &[Uuid]) -> AppResult<Vec<(Uuid, i32)>> {
    let known: HashSet<Uuid> = current.iter().map(|s| s.id).collect();
    let mut positions: HashMap<Uuid, i32> = HashMap::with_capacity(ordered_ids.len());

    for (index, id) in ordered_ids.iter().enumerate() {
        if !known.contains(id) {
            return Err(AppError::BadRequest(format!(
                "Stop {} does not belong to this route",
                id
            )));
        }
        if positions.insert(*id, index as i32 + 1).is_some() {
            return Err(AppError::BadRequest(format!(
                "Stop {} appears more than once in the requested order",
                id
            )));
        }
    }

    if let Some(missing) = current.iter().find(|s| !positions.contains_key(&s.id)) {
        return Err(AppError::BadRequest(format!(
            "Stop {} is missing from the requested order",
            missing.id
        )));
    }

    Ok(ordered_ids
        .iter()
        .map(|id| (*id, positions[id]))
        .collect())
}

/// Reasigna 1..N conservando el orden relativo actual
pub fn renumber_stops(stops: &mut [RouteStop]) {
    stops.sort_by_key(|s| s.stop_order);
    for (index, stop) in stops.iter_mut().enumerate() {
        stop.stop_order = index as i32 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops() -> (Uuid, Vec<RouteStop>) {
        let route_id = Uuid::new_v4();
        let time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        let mut list = vec![
            RouteStop::new(route_id, "A", time),
            RouteStop::new(route_id, "B", time),
            RouteStop::new(route_id, "C", time),
        ];
        for (i, stop) in list.iter_mut().enumerate() {
            stop.stop_order = i as i32 + 1;
        }
        (route_id, list)
    }

    #[test]
    fn test_reverse_order() {
        let (_, list) = stops();
        let ids = vec![list[2].id, list[1].id, list[0].id];
        let plan: HashMap<Uuid, i32> = plan_stop_order(&list, &ids).unwrap().into_iter().collect();
        assert_eq!(plan[&list[0].id], 3);
        assert_eq!(plan[&list[1].id], 2);
        assert_eq!(plan[&list[2].id], 1);
    }

    #[test]
    fn test_unknown_id_rejected() {
        let (_, list) = stops();
        let ids = vec![list[2].id, Uuid::new_v4(), list[0].id];
        assert!(matches!(plan_stop_order(&list, &ids), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_missing_and_duplicate_ids_rejected() {
        let (_, list) = stops();
        assert!(plan_stop_order(&list, &[list[0].id, list[1].id]).is_err());
        assert!(plan_stop_order(&list, &[list[0].id, list[0].id, list[1].id, list[2].id]).is_err());
    }

    #[test]
    fn test_renumber_closes_gaps() {
        let (_, mut list) = stops();
        list.remove(1);
        renumber_stops(&mut list);
        let orders: Vec<i32> = list.iter().map(|s| s.stop_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(list[1].stop_name, "C");
    }
}
