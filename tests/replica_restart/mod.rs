mod failure_paths_test;
mod scenario_test;
