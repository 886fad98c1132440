mod script;

pub use script::ScriptedPlanner;
