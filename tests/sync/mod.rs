mod cycle;
mod runner;
