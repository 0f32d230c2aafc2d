use std::collections::HashSet;

use shared::domain::{Availability, Hospital, HospitalId};

/// Read-only list of hospitals a request can be sent to. Order is fixed at
/// construction and every lookup preserves it.
#[derive(Debug, Clone)]
pub struct HospitalDirectory {
    hospitals: Vec<Hospital>,
}

impl HospitalDirectory {
    pub fn builtin() -> Self {
        Self::from_hospitals(vec![
            hospital(
                1,
                "City General Hospital",
                "123 Main Street, Downtown",
                "2.5 km",
                "+1 234-567-8900",
                Availability::Available,
            ),
            hospital(
                2,
                "St. Mary's Medical Center",
                "456 Oak Avenue, Midtown",
                "4.1 km",
                "+1 234-567-8901",
                Availability::Available,
            ),
            hospital(
                3,
                "Regional Healthcare Complex",
                "789 Pine Road, Eastside",
                "5.8 km",
                "+1 234-567-8902",
                Availability::Limited,
            ),
            hospital(
                4,
                "Memorial Hospital",
                "321 Elm Street, Westend",
                "7.2 km",
                "+1 234-567-8903",
                Availability::Available,
            ),
        ])
    }

    /// Later entries with an id seen before are dropped.
    pub fn from_hospitals(hospitals: Vec<Hospital>) -> Self {
        let mut seen = HashSet::new();
        let hospitals = hospitals
            .into_iter()
            .filter(|hospital| seen.insert(hospital.id))
            .collect();
        Self { hospitals }
    }

    pub fn list_all(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn get(&self, id: HospitalId) -> Option<&Hospital> {
        self.hospitals.iter().find(|hospital| hospital.id == id)
    }

    pub fn contains(&self, id: HospitalId) -> bool {
        self.get(id).is_some()
    }

    /// Snapshots of the requested hospitals in directory order, whatever order
    /// the ids come in. Unknown ids are skipped.
    pub fn find_by_ids<'a>(&self, ids: impl IntoIterator<Item = &'a HospitalId>) -> Vec<Hospital> {
        let wanted: HashSet<HospitalId> = ids.into_iter().copied().collect();
        self.hospitals
            .iter()
            .filter(|hospital| wanted.contains(&hospital.id))
            .cloned()
            .collect()
    }
}

impl Default for HospitalDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

fn hospital(
    id: i64,
    name: &str,
    location: &str,
    distance: &str,
    phone: &str,
    availability: Availability,
) -> Hospital {
    Hospital {
        id: HospitalId(id),
        name: name.into(),
        location: location.into(),
        distance: distance.into(),
        phone: phone.into(),
        availability,
        blood_bank: true,
    }
}
