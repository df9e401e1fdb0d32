mod driver;
mod tracker;
