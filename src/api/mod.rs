use rocket::Route;

mod commissioner;
mod common;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(commissioner::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}
