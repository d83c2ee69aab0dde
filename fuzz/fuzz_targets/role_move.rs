#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use herald_core::{Guild, GuildId, HeraldError, Role, RoleId};
use herald_state::plan_move;

#[derive(Arbitrary, Debug)]
struct Input {
    /// Positions of the non-default roles; duplicates and gaps allowed
    positions: Vec<u8>,
    moves: Vec<(u8, i8)>,
}

fuzz_target!(|input: Input| {
    let gid = GuildId::new(1);
    let mut guild = Guild::new(gid, "fuzz");
    guild.roles.upsert(Role::new(RoleId::everyone(gid), gid, 0));
    for (i, position) in input.positions.iter().take(64).enumerate() {
        guild
            .roles
            .upsert(Role::new(RoleId::new(100 + i as u64), gid, i32::from(*position) + 1));
    }
    let count = guild.roles.len() as u8;

    for (pick, target) in input.moves.iter().take(32) {
        let role_id = guild
            .roles
            .iter()
            .nth(usize::from(*pick % count))
            .map(|r| r.id)
            .unwrap_or(RoleId::new(u64::MAX));
        let target = i32::from(*target);
        let before = guild.roles.clone();

        match plan_move(&mut guild, role_id, target) {
            Ok(moves) => {
                assert!(target > 0);
                // Positions handed out form a contiguous run
                for pair in moves.windows(2) {
                    assert_eq!(pair[1].position, pair[0].position + 1);
                }
                assert_eq!(guild.default_role().map(|r| r.position), Some(0));
            }
            Err(HeraldError::PositionBounds { .. }) => assert!(target <= 0),
            Err(HeraldError::UnmovableDefaultRole) => assert!(guild.role(role_id).unwrap().is_default()),
            Err(e) => panic!("unexpected error: {e}"),
        }
        if target <= 0 {
            assert_eq!(guild.roles, before);
        }
    }
});
