pub mod common;

#[cfg(test)]
mod test_resolve_turn;



#[cfg(test)]
mod test_damage_effects;
