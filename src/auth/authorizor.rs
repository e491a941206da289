use oso::{Oso, PolarClass};

use crate::auth::{Platform, User};
use crate::entities::{Bid, Ride};

pub fn new() -> Oso {
    let mut o = Oso::new();

    o.register_class(Platform::get_polar_class()).unwrap();
    o.register_class(User::get_polar_class()).unwrap();
    o.register_class(Ride::get_polar_class()).unwrap();
    o.register_class(Bid::get_polar_class()).unwrap();

    o.load_str(include_str!("rules.polar")).unwrap();

    o
}

#[test]
fn platform_role_test() {
    use uuid::Uuid;

    let authorizor = new();

    let driver = User::new(Uuid::new_v4(), vec!["driver".into()]);
    let rider = User::new(Uuid::new_v4(), vec!["rider".into()]);

    let result = authorizor.is_allowed(driver.clone(), "submit_bid", Platform::default());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(rider.clone(), "create_ride", Platform::default());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(rider.clone(), "submit_bid", Platform::default());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn system_role_test() {
    use uuid::Uuid;

    let authorizor = new();

    let system = User::new_system_user();
    let ride = Ride::new(Uuid::new_v4());

    let result = authorizor.is_allowed(system.clone(), "audit", Platform::default());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(system.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), true);
}

#[test]
fn ride_rider_role_test() {
    use uuid::Uuid;

    let authorizor = new();

    let rider = User::new(Uuid::new_v4(), vec!["rider".into()]);
    let stranger = User::new(Uuid::new_v4(), vec!["rider".into()]);
    let ride = Ride::new(rider.id);

    let result = authorizor.query_rule("has_role", (rider.clone(), "rider", ride.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.is_allowed(rider.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(rider.clone(), "accept_bid", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn ride_assigned_driver_role_test() {
    use uuid::Uuid;

    let authorizor = new();

    let driver = User::new(Uuid::new_v4(), vec!["driver".into()]);
    let mut ride = Ride::new(Uuid::new_v4());
    ride.schedule(driver.id, 4500).unwrap();

    let result = authorizor.is_allowed(driver.clone(), "advance", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(driver.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn bid_owner_role_test() {
    use uuid::Uuid;

    let authorizor = new();

    let driver = User::new(Uuid::new_v4(), vec!["driver".into()]);
    let rider = User::new(Uuid::new_v4(), vec!["rider".into()]);
    let bid = Bid::new(Uuid::new_v4(), driver.id, 5000, None).unwrap();

    let result = authorizor.is_allowed(driver.clone(), "withdraw_bid", bid.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(rider.clone(), "withdraw_bid", bid.clone());
    assert_eq!(result.unwrap(), false);
}
