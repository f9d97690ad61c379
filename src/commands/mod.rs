pub mod fetch_profile;
