use monorail_game::constants::{COLLIDE_DISTANCE, MAX_SPEED};
use monorail_game::{
    Cart, CartId, GameEvent, Level, NullSink, Playfield, RngBundle, Tile, TileId, TilePos, TileShape,
    TrailPosition, resolve_collision,
};

fn flat(x: i32, y: i32) -> Tile {
    Tile::new(TilePos::new(x, y, 0), TileShape::Flat)
}

fn column(len: i32) -> Level {
    Level::from_tiles((0..len).map(|y| flat(0, y)))
}

fn at(level: &Level, x: i32, y: i32) -> TileId {
    level.tile_at(x, y).expect("tile on the grid")
}

#[test]
fn rectangle_loop_keeps_the_cart_on_track() {
    let level = Level::from_tiles([flat(0, 0), flat(1, 0), flat(1, 1), flat(0, 1)]);
    let loop_tiles: Vec<TileId> = level.ids().collect();
    let start = at(&level, 0, 0);
    let mut field = Playfield::new(level);
    let id = field.add_cart_at(0, TrailPosition::new(start, 0));
    field.cart_mut(id).expect("cart").speed = 140;

    let rng = RngBundle::from_user_seed(500);
    for tick in 0..500 {
        field.tick(&rng, &mut NullSink);
        let cart = field.cart(id).expect("cart");
        let pos = cart.position.expect("cart stays placed");
        assert!(loop_tiles.contains(&pos.tile), "tick {tick}: left the loop");
        assert!(
            (0..=MAX_SPEED).contains(&cart.speed),
            "tick {tick}: speed {}",
            cart.speed
        );
        let len = field.level[pos.tile].length();
        assert!((0..=len).contains(&pos.progress));
    }
}

#[test]
fn portals_cycle_the_cart_through_both_ends() {
    let level = Level::from_tiles([
        Tile::new(TilePos::new(2, 0, 0), TileShape::Portal),
        flat(1, 0),
        flat(0, 0),
        flat(0, 1),
        flat(0, 2),
        flat(1, 2),
        Tile::new(TilePos::new(2, 2, 0), TileShape::Portal),
    ]);
    let portal_a = at(&level, 2, 0);
    let tile_aa = at(&level, 1, 0);
    let tile_a = at(&level, 0, 0);
    let tile_b = at(&level, 0, 1);
    let tile_c = at(&level, 0, 2);
    let tile_cc = at(&level, 1, 2);
    let portal_c = at(&level, 2, 2);
    let order = [
        tile_b, tile_c, tile_cc, portal_c, portal_a, tile_aa, tile_a, tile_b,
    ];

    let mut field = Playfield::new(level);
    let id = field.add_cart_at(0, TrailPosition::new(tile_b, 0));
    let rng = RngBundle::from_user_seed(7);
    let mut events = Vec::new();

    let mut order_at = 0;
    let mut count = 0;
    while order_at < order.len() - 1 && count < 1000 {
        field.tick(&rng, &mut events);
        let tile = field.cart(id).and_then(|c| c.position).expect("placed").tile;
        if tile == order[order_at + 1] {
            order_at += 1;
        } else {
            assert_eq!(tile, order[order_at], "unknown tile after step {order_at}");
        }
        count += 1;
    }
    assert!(count < 1000, "cart never completed the cycle");
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::Teleport { from, to, .. } if *from == portal_c && *to == portal_a
    )));
}

#[test]
fn head_on_carts_end_up_a_collide_distance_apart() {
    let level = column(3);
    let middle = at(&level, 0, 1);
    let mut field = Playfield::new(level);
    let a = field.add_cart_at(0, TrailPosition::new(middle, 240));
    let mut towards = TrailPosition::new(middle, 240 + COLLIDE_DISTANCE + 20);
    towards.reverse();
    let b = field.add_cart_at(1, towards);
    for id in [a, b] {
        field.cart_mut(id).expect("cart").speed = 15;
    }

    let rng = RngBundle::from_user_seed(1);
    let mut events = Vec::new();
    field.tick(&rng, &mut events);

    let pa = field.cart(a).and_then(|c| c.position).expect("a");
    let pb = field.cart(b).and_then(|c| c.position).expect("b");
    let gap = pa.distance(&field.level, &pb);
    assert!(
        (COLLIDE_DISTANCE..=COLLIDE_DISTANCE + 20).contains(&gap),
        "gap {gap}"
    );
    assert!(events.iter().any(|e| matches!(e, GameEvent::CartHit { .. })));
}

#[test]
fn colliding_carts_never_end_closer_than_the_floor() {
    for offset in [0, 50, 120, 260, 430, 499] {
        for reversed in [false, true] {
            let level = column(3);
            let middle = at(&level, 0, 1);
            let mut a = Cart::new(CartId(0), 0, Some(TrailPosition::new(middle, 250)));
            let mut pos = TrailPosition::new(middle, 250 + offset);
            if reversed {
                pos.reverse();
            }
            let mut b = Cart::new(CartId(1), 1, Some(pos));
            a.speed = 120 + offset / 10;
            b.speed = 90;
            resolve_collision(&mut a, &mut b, &level, &mut NullSink);
            let (pa, pb) = (a.position.expect("a"), b.position.expect("b"));
            let gap = pa.distance(&level, &pb);
            assert!(
                gap >= COLLIDE_DISTANCE - 1,
                "offset {offset}, reversed {reversed}: gap {gap}"
            );
        }
    }
}

/// Every pair of carts on the same or neighboring tiles of a ring, including
/// pairs sitting on tile joints, ends a collision at least the floor apart.
#[test]
fn colliding_carts_across_joints_never_end_closer_than_the_floor() {
    let ring: Vec<Tile> = (0..3)
        .flat_map(|y| (0..3).map(move |x| (x, y)))
        .filter(|&(x, y)| (x, y) != (1, 1))
        .map(|(x, y)| flat(x, y))
        .collect();
    let level = Level::from_tiles(ring);
    let stops = |tile: TileId| {
        let len = level[tile].length();
        [0, 1, len / 2, len - 1, len]
    };

    let mut hits = 0;
    for tile_a in level.ids() {
        let mut partners = vec![tile_a];
        partners.extend(level[tile_a].in_neighbor());
        partners.extend(level[tile_a].out_neighbor());
        for tile_b in partners {
            for progress_a in stops(tile_a) {
                for progress_b in stops(tile_b) {
                    for (reversed_a, reversed_b) in
                        [(false, false), (false, true), (true, false), (true, true)]
                    {
                        let mut pa = TrailPosition::new(tile_a, progress_a);
                        let mut pb = TrailPosition::new(tile_b, progress_b);
                        if reversed_a {
                            pa.reverse();
                        }
                        if reversed_b {
                            pb.reverse();
                        }
                        let before = pa.distance(&level, &pb);
                        if before >= COLLIDE_DISTANCE {
                            continue;
                        }
                        let mut a = Cart::new(CartId(0), 0, Some(pa));
                        let mut b = Cart::new(CartId(1), 1, Some(pb));
                        a.speed = 150;
                        b.speed = 150;
                        resolve_collision(&mut a, &mut b, &level, &mut NullSink);
                        hits += 1;
                        let (pa, pb) = (a.position.expect("a"), b.position.expect("b"));
                        let gap = pa.distance(&level, &pb);
                        assert!(
                            gap >= COLLIDE_DISTANCE - 1,
                            "{:?}@{progress_a} (reversed {reversed_a}) vs {:?}@{progress_b} \
                             (reversed {reversed_b}): gap {before} -> {gap}",
                            tile_a,
                            tile_b
                        );
                    }
                }
            }
        }
    }
    assert!(hits > 0);
}

/// Replays one tick of the documented order by hand: each cart moves, then
/// resolves against every other cart in index order.
fn tick_by_hand(level: &mut Level, carts: &mut [Cart]) {
    let rng = RngBundle::from_user_seed(0);
    for idx in 0..carts.len() {
        carts[idx].tick(level, &mut *rng.physics(), &mut NullSink);
        for other in 0..carts.len() {
            if other == idx {
                continue;
            }
            let (cart, rival) = if idx < other {
                let (left, right) = carts.split_at_mut(other);
                (&mut left[idx], &mut right[0])
            } else {
                let (left, right) = carts.split_at_mut(idx);
                (&mut right[0], &mut left[other])
            };
            resolve_collision(cart, rival, level, &mut NullSink);
        }
        carts[idx].align_switch(level);
    }
}

fn three_cart_starts(level: &Level) -> [(TrailPosition, i32); 3] {
    let top = at(level, 0, 0);
    let middle = at(level, 0, 1);
    let mut oncoming = TrailPosition::new(middle, 100);
    oncoming.reverse();
    [
        (TrailPosition::new(top, 300), 100),
        (TrailPosition::new(top, 700), 100),
        (oncoming, 100),
    ]
}

/// `(position, speed)` of every role after one tick, cart order given by `order`.
fn outcome(order: [usize; 3]) -> (Vec<(TrailPosition, i32)>, Vec<(TrailPosition, i32)>) {
    let level = column(3);
    let starts = three_cart_starts(&level);

    let mut field = Playfield::new(level.clone());
    let mut ids = [CartId(0); 3];
    for &role in &order {
        let (pos, speed) = starts[role];
        ids[role] = field.add_cart_at(0, pos);
        field.cart_mut(ids[role]).expect("cart").speed = speed;
    }
    field.tick(&RngBundle::from_user_seed(0), &mut NullSink);
    let from_field = ids
        .iter()
        .map(|id| {
            let cart = field.cart(*id).expect("cart");
            (cart.position.expect("placed"), cart.speed)
        })
        .collect();

    let mut by_hand_level = level;
    let mut carts: Vec<Cart> = order
        .iter()
        .enumerate()
        .map(|(slot, &role)| {
            let (pos, speed) = starts[role];
            let mut cart = Cart::new(CartId(u32::try_from(slot).unwrap_or(0)), 0, None);
            cart.place(&mut by_hand_level, pos);
            cart.speed = speed;
            cart
        })
        .collect();
    tick_by_hand(&mut by_hand_level, &mut carts);
    let mut by_hand = vec![(starts[0].0, 0); 3];
    for (slot, &role) in order.iter().enumerate() {
        let cart = &carts[slot];
        by_hand[role] = (cart.position.expect("placed"), cart.speed);
    }
    (from_field, by_hand)
}

fn same(a: &[(TrailPosition, i32)], b: &[(TrailPosition, i32)]) -> bool {
    a.iter()
        .zip(b)
        .all(|((pa, sa), (pb, sb))| pa == pb && pa.is_reversed() == pb.is_reversed() && sa == sb)
}

#[test]
fn three_carts_follow_the_index_order_contract() {
    let (forward, forward_by_hand) = outcome([0, 1, 2]);
    assert!(same(&forward, &forward_by_hand), "{forward:?} vs {forward_by_hand:?}");

    let (backward, backward_by_hand) = outcome([2, 1, 0]);
    assert!(same(&backward, &backward_by_hand), "{backward:?} vs {backward_by_hand:?}");

    // Collisions are not commutative: the enumeration order shows in the result.
    assert!(!same(&forward, &backward));
}
