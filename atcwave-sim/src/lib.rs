//! Atcwave Sim - external collaborators for atcwave: the simulator
//! dataref bridge, static data parsers, and the mock simulator.

pub mod airport_parser;
pub mod dataref;
pub mod mock;
pub mod phrase_loader;
pub mod region_parser;
pub mod schedule;
pub mod voice_loader;
